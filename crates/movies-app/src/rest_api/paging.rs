use movies_dal::ListingParams;

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct Paging {
    /// Number of records to skip, default 0
    skip: Option<u32>,
    /// Number of records to return, default is configured page size
    take: Option<u32>,
}

impl Paging {
    pub fn new(skip: Option<u32>, take: Option<u32>) -> Self {
        Self { skip, take }
    }

    pub fn into_listing_params(self, default_page_size: u32) -> ListingParams {
        let offset = self.skip.unwrap_or(0);
        let limit = self.take.unwrap_or(default_page_size);
        ListingParams::new(offset.into(), limit.into())
    }
}
