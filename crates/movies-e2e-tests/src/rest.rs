use anyhow::Result;
use movies_dal::movie::ReadMovie;
use reqwest::Url;
use serde_json::json;
use tracing::info;

pub async fn create_movie(
    client: &reqwest::Client,
    base_url: &Url,
    title: &str,
    genre: &str,
    duration: i32,
) -> Result<ReadMovie> {
    let payload = json!({"title": title, "genre": genre, "duration": duration});
    let api_url = base_url.join("filme")?;

    let response = client.post(api_url).json(&payload).send().await?;
    info!("Response: {:#?}", response);
    assert_eq!(201, response.status().as_u16());

    let new_movie: ReadMovie = response.json().await?;
    Ok(new_movie)
}
