// Hebcal zmanim client - the calendar lookup behind the restricted-period
// gate. One GET against the geolocation-keyed endpoint; the response carries
// an "is work currently forbidden" flag covering sabbath and holidays.

use crate::core::calendar::{CalendarError, CalendarLookup};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const ZMANIM_URL: &str = "https://www.hebcal.com/zmanim";

#[derive(Debug, Deserialize)]
struct ZmanimResponse {
    #[serde(default)]
    status: Option<RestrictionStatus>,
}

#[derive(Debug, Deserialize)]
struct RestrictionStatus {
    #[serde(rename = "isAssurBemlacha", default)]
    is_assur_bemlacha: bool,
}

pub struct HebcalClient {
    client: Client,
    geoname_id: u32,
}

impl HebcalClient {
    pub fn new(geoname_id: u32) -> Result<Self, CalendarError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CalendarError::Lookup(e.to_string()))?;
        Ok(Self { client, geoname_id })
    }
}

#[async_trait]
impl CalendarLookup for HebcalClient {
    async fn is_restricted_now(&self) -> Result<bool, CalendarError> {
        let response = self
            .client
            .get(ZMANIM_URL)
            .query(&[
                ("cfg", "json".to_string()),
                ("im", "1".to_string()),
                ("geonameid", self.geoname_id.to_string()),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::Lookup(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CalendarError::Lookup(format!(
                "zmanim endpoint answered {}",
                response.status()
            )));
        }

        let body: ZmanimResponse = response
            .json()
            .await
            .map_err(|e| CalendarError::Lookup(e.to_string()))?;
        Ok(body.status.map(|s| s.is_assur_bemlacha).unwrap_or(false))
    }
}
