use std::time::Duration;

use movies_dal::{
    ListingParams,
    movie::{Movie, MovieRepository},
};
use sqlx::Executor;
use tempfile::TempDir;

async fn init_db() -> movies_dal::Pool {
    const DB_URL: &str = "sqlite::memory:";
    // single connection, otherwise each connection gets its own memory database
    let conn = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect(DB_URL)
        .await
        .unwrap();
    conn.execute("PRAGMA foreign_keys = ON").await.unwrap();
    movies_dal::migrate(&conn).await.unwrap();

    conn
}

async fn init_file_db(dir: &TempDir) -> movies_dal::Pool {
    let url = format!("sqlite://{}/movies.db", dir.path().display());
    let pool = movies_dal::new_pool(&url).await.unwrap();
    movies_dal::migrate(&pool).await.unwrap();
    pool
}

fn movie(title: &str, genre: &str, duration: i32) -> Movie {
    Movie {
        id: 0,
        title: title.to_string(),
        genre: genre.to_string(),
        duration,
    }
}

#[tokio::test]
async fn test_insert_and_find() {
    let repo = MovieRepository::new(init_db().await);

    let id = repo.insert(&movie("Dune", "SciFi", 155)).await.unwrap();

    let stored = repo.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(id, stored.id);
    assert_eq!("Dune", stored.title);
    assert_eq!("SciFi", stored.genre);
    assert_eq!(155, stored.duration);

    let missing = repo.find_by_id(id + 1000).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_uncommitted_changes_are_discarded() {
    let repo = MovieRepository::new(init_db().await);
    let id = repo.insert(&movie("Ghost", "Drama", 120)).await.unwrap();

    {
        let mut transaction = repo.begin_write().await.unwrap();
        let mut stored = transaction.find_by_id(id).await.unwrap().unwrap();
        stored.title = "Changed".to_string();
        transaction.update(&stored).await.unwrap();
        // dropped without commit
    }

    let stored = repo.find_by_id(id).await.unwrap().unwrap();
    assert_eq!("Ghost", stored.title);
}

#[tokio::test]
async fn test_paging() {
    let repo = MovieRepository::new(init_db().await);

    for i in 0..60 {
        repo.insert(&movie(&format!("Movie {i}"), "Genre", 90 + i))
            .await
            .unwrap();
    }

    let first = repo.find_page(ListingParams::new(0, 50)).await.unwrap();
    assert_eq!(50, first.len());
    assert_eq!("Movie 0", first[0].title);
    assert_eq!("Movie 49", first[49].title);

    let rest = repo.find_page(ListingParams::new(50, 50)).await.unwrap();
    assert_eq!(10, rest.len());
    assert_eq!("Movie 50", rest[0].title);
    assert_eq!("Movie 59", rest[9].title);
    assert!(rest.windows(2).all(|w| w[0].id < w[1].id));

    let empty = repo.find_page(ListingParams::new(60, 50)).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_update_and_delete() {
    let repo = MovieRepository::new(init_db().await);
    let id = repo.insert(&movie("Alien", "Horror", 117)).await.unwrap();

    let mut stored = repo.find_by_id(id).await.unwrap().unwrap();
    stored.genre = "SciFi".to_string();
    repo.update(&stored).await.unwrap();

    let stored = repo.find_by_id(id).await.unwrap().unwrap();
    assert_eq!("SciFi", stored.genre);
    assert_eq!("Alien", stored.title);

    let mut transaction = repo.begin_write().await.unwrap();
    let mut changed = transaction.find_by_id(id).await.unwrap().unwrap();
    changed.duration = 120;
    transaction.update(&changed).await.unwrap();
    transaction.commit().await.unwrap();
    assert_eq!(120, repo.find_by_id(id).await.unwrap().unwrap().duration);

    repo.delete(id).await.unwrap();
    assert!(repo.find_by_id(id).await.unwrap().is_none());

    let res = repo.delete(id).await;
    assert!(matches!(res, Err(movies_dal::Error::RecordNotFound(_))));
    let res = repo.update(&stored).await;
    assert!(matches!(res, Err(movies_dal::Error::RecordNotFound(_))));
}

#[tokio::test]
async fn test_ids_are_not_reused() {
    let repo = MovieRepository::new(init_db().await);

    let first = repo.insert(&movie("One", "Drama", 100)).await.unwrap();
    let second = repo.insert(&movie("Two", "Drama", 100)).await.unwrap();
    repo.delete(second).await.unwrap();
    let third = repo.insert(&movie("Three", "Drama", 100)).await.unwrap();

    assert!(second > first);
    assert!(third > second);
}

#[tokio::test]
async fn test_interleaved_writers() {
    let dir = TempDir::new().unwrap();
    let repo = MovieRepository::new(init_file_db(&dir).await);
    let a = repo.insert(&movie("Alien", "Horror", 117)).await.unwrap();
    let b = repo.insert(&movie("Brazil", "Comedy", 132)).await.unwrap();

    // reads of full updates hold no lock, writes on other records go through
    let mut first = repo.find_by_id(a).await.unwrap().unwrap();
    let mut second = repo.find_by_id(b).await.unwrap().unwrap();
    first.genre = "SciFi".to_string();
    second.genre = "Drama".to_string();
    repo.update(&first).await.unwrap();
    repo.update(&second).await.unwrap();

    // second writer waits until first one commits
    let mut transaction = repo.begin_write().await.unwrap();
    let mut first = transaction.find_by_id(a).await.unwrap().unwrap();

    let other = repo.clone();
    let concurrent = tokio::spawn(async move {
        let mut transaction = other.begin_write().await?;
        let mut second = transaction
            .find_by_id(b)
            .await?
            .ok_or_else(|| movies_dal::Error::RecordNotFound("Movie".to_string()))?;
        second.duration = 142;
        transaction.update(&second).await?;
        transaction.commit().await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    first.duration = 116;
    transaction.update(&first).await.unwrap();
    transaction.commit().await.unwrap();

    concurrent.await.unwrap().unwrap();

    let first = repo.find_by_id(a).await.unwrap().unwrap();
    let second = repo.find_by_id(b).await.unwrap().unwrap();
    assert_eq!(("SciFi", 116), (first.genre.as_str(), first.duration));
    assert_eq!(("Drama", 142), (second.genre.as_str(), second.duration));
}
