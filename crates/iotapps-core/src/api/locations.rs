//! Location endpoints: narratives and location users.

use tracing::debug;

use crate::auth::AuthError;
use crate::models::{
    ApiResponseBase, GetNarrativesResponse, LocationUsersModel, Narrative, NarrativesQuery,
};

use super::{ApiClient, ApiError, AppApi};

impl ApiClient {
    /// `GET /locations/{id}/narratives`
    pub async fn get_narratives(
        &self,
        location_id: i64,
        query: &NarrativesQuery,
    ) -> Result<GetNarrativesResponse, ApiError> {
        let url = self.endpoint(&format!("/locations/{}/narratives", location_id));
        let pairs = query.to_pairs();
        self.execute(&url, |http| http.get(&url).query(&pairs)).await
    }

    /// `POST /locations/{id}/users`
    pub async fn add_location_users(
        &self,
        location_id: i64,
        users: &LocationUsersModel,
    ) -> Result<ApiResponseBase, ApiError> {
        let url = self.endpoint(&format!("/locations/{}/users", location_id));
        self.execute(&url, |http| http.post(&url).json(users)).await
    }
}

/// Location endpoints authenticated by the current session
pub struct LocationsApi<'a> {
    pub(super) app: &'a AppApi,
}

impl LocationsApi<'_> {
    /// One page of narratives
    pub async fn narratives(
        &self,
        location_id: i64,
        query: &NarrativesQuery,
    ) -> Result<GetNarrativesResponse, AuthError> {
        let client = self.app.authorized_client().await?;
        client
            .get_narratives(location_id, query)
            .await
            .map_err(|e| self.app.on_api_error(e))
    }

    /// Follow `nextMarker` until the last page or `max_pages` pages
    pub async fn all_narratives(
        &self,
        location_id: i64,
        query: &NarrativesQuery,
        max_pages: usize,
    ) -> Result<Vec<Narrative>, AuthError> {
        let mut query = query.clone();
        let mut narratives = Vec::new();

        for page in 0..max_pages {
            let response = self.narratives(location_id, &query).await?;
            debug!(
                location_id = location_id,
                page = page,
                count = response.narratives.len(),
                "Fetched narratives page"
            );
            narratives.extend(response.narratives);
            match response.next_marker.filter(|m| !m.is_empty()) {
                Some(marker) => query.page_marker = Some(marker),
                None => break,
            }
        }

        Ok(narratives)
    }

    pub async fn add_users(
        &self,
        location_id: i64,
        users: &LocationUsersModel,
    ) -> Result<ApiResponseBase, AuthError> {
        let client = self.app.authorized_client().await?;
        client
            .add_location_users(location_id, users)
            .await
            .map_err(|e| self.app.on_api_error(e))
    }
}
