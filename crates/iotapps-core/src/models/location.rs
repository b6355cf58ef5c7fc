use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ApiResponseBase;

/// Declares a numeric wire enum that keeps unknown codes instead of failing
/// to deserialize the whole response.
macro_rules! numeric_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(from = "i32", into = "i32")]
        pub enum $name {
            $($variant,)+
            Other(i32),
        }

        impl From<i32> for $name {
            fn from(code: i32) -> Self {
                match code {
                    $($code => $name::$variant,)+
                    other => $name::Other(other),
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                match value {
                    $($name::$variant => $code,)+
                    $name::Other(other) => other,
                }
            }
        }
    };
}

numeric_enum! {
    /// Why a narrative was created
    NarrativeType {
        Default = 0,
        UserDeleted = 1,
        LocationDeleted = 2,
        LocationRemoved = 3,
    }
}

numeric_enum! {
    NarrativePriority {
        Detail = 0,
        Info = 1,
        Warning = 2,
        Critical = 3,
    }
}

numeric_enum! {
    NarrativeStatus {
        Active = 0,
        Hidden = 1,
        Deleted = 2,
        Resolved = 3,
    }
}

numeric_enum! {
    /// Access a user has been granted to a location
    LocationAccessLevel {
        NoAccess = 0,
        ReadOnly = 10,
        Control = 20,
        Admin = 30,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetNarrativesResponse {
    #[serde(flatten)]
    pub base: ApiResponseBase,
    /// Marker of the next page, absent on the last page
    #[serde(rename = "nextMarker", default)]
    pub next_marker: Option<String>,
    #[serde(default)]
    pub narratives: Vec<Narrative>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub id: i64,
    #[serde(rename = "narrativeType")]
    pub narrative_type: NarrativeType,
    #[serde(rename = "locationId")]
    pub location_id: i64,
    #[serde(rename = "organizationId")]
    pub organization_id: Option<i64>,
    #[serde(rename = "narrativeDate")]
    pub narrative_date: Option<String>,
    #[serde(rename = "narrativeDateMs")]
    pub narrative_date_ms: Option<i64>,
    #[serde(rename = "creationDate")]
    pub creation_date: Option<String>,
    #[serde(rename = "creationDateMs")]
    pub creation_date_ms: Option<i64>,
    pub priority: Option<NarrativePriority>,
    pub status: Option<NarrativeStatus>,
    pub icon: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub target: Option<HashMap<String, String>>,
    /// Set when the narrative was posted by a bot
    #[serde(rename = "appInstanceId")]
    pub app_instance_id: Option<i64>,
    /// Set for the removal narrative types
    pub user: Option<NarrativeUser>,
}

impl Narrative {
    /// Narrative timestamp, preferring the millisecond field
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.narrative_date_ms
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .or_else(|| {
                self.narrative_date
                    .as_deref()
                    .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                    .map(|d| d.with_timezone(&Utc))
            })
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(untitled)")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeUser {
    pub id: i64,
    #[serde(rename = "creationDate")]
    pub creation_date: Option<String>,
    #[serde(rename = "creationDateMs")]
    pub creation_date_ms: Option<i64>,
    #[serde(rename = "deleteDate")]
    pub delete_date: Option<String>,
    #[serde(rename = "deleteDateMs")]
    pub delete_date_ms: Option<i64>,
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    #[serde(rename = "altUsername")]
    pub alt_username: Option<String>,
    #[serde(rename = "passwordSet", default)]
    pub password_set: bool,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    pub email: Option<NarrativeUserEmail>,
    pub phone: Option<String>,
    #[serde(rename = "phoneType")]
    pub phone_type: Option<i32>,
    #[serde(rename = "smsStatus")]
    pub sms_status: Option<i32>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeUserEmail {
    pub email: Option<String>,
    #[serde(default)]
    pub verified: bool,
    pub status: Option<i32>,
}

/// Filters for `GET /locations/{id}/narratives`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NarrativesQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page_marker: Option<String>,
    pub row_count: Option<u32>,
    pub priority: Option<NarrativePriority>,
    pub status: Option<NarrativeStatus>,
    pub search_by: Option<String>,
}

impl NarrativesQuery {
    /// Query string pairs, skipping unset filters
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(start) = self.start_date {
            pairs.push(("startDate", start.to_rfc3339()));
        }
        if let Some(end) = self.end_date {
            pairs.push(("endDate", end.to_rfc3339()));
        }
        if let Some(ref marker) = self.page_marker {
            pairs.push(("pageMarker", marker.clone()));
        }
        if let Some(rows) = self.row_count {
            pairs.push(("rowCount", rows.to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", i32::from(priority).to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", i32::from(status).to_string()));
        }
        if let Some(ref search) = self.search_by {
            pairs.push(("searchBy", search.clone()));
        }
        pairs
    }
}

/// Body of `POST /locations/{id}/users`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationUsersModel {
    pub users: Vec<LocationUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUser {
    pub id: i64,
    #[serde(rename = "locationAccess")]
    pub location_access: LocationAccessLevel,
    pub temporary: bool,
    /// Notifications category
    pub category: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedules: Option<Vec<LocationUserSchedule>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationUserSchedule {
    /// Bitmask of days, bit 0 = Sunday
    #[serde(rename = "daysOfWeek", skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<u8>,
    /// Minutes since midnight
    #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u32>,
    #[serde(rename = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_narratives_response() {
        let json = r#"{
            "resultCode": 0,
            "nextMarker": "m-2",
            "narratives": [
                {"id": 7, "narrativeType": 0, "locationId": 123, "narrativeDateMs": 1760000000000,
                 "priority": 2, "status": 0, "title": "Front door opened", "target": {"deviceId": "d-1"}},
                {"id": 8, "narrativeType": 1, "locationId": 123, "priority": 9,
                 "user": {"id": 55, "passwordSet": true, "userName": "gone@example.com"}}
            ]
        }"#;

        let resp: GetNarrativesResponse =
            serde_json::from_str(json).expect("Failed to parse narratives test JSON");
        assert_eq!(resp.next_marker.as_deref(), Some("m-2"));
        assert_eq!(resp.narratives.len(), 2);

        let first = &resp.narratives[0];
        assert_eq!(first.narrative_type, NarrativeType::Default);
        assert_eq!(first.priority, Some(NarrativePriority::Warning));
        assert_eq!(first.display_title(), "Front door opened");
        assert_eq!(
            first.timestamp().map(|t| t.timestamp_millis()),
            Some(1_760_000_000_000)
        );

        let second = &resp.narratives[1];
        assert_eq!(second.narrative_type, NarrativeType::UserDeleted);
        assert_eq!(second.priority, Some(NarrativePriority::Other(9)));
        assert_eq!(second.display_title(), "(untitled)");
        assert_eq!(
            second.user.as_ref().and_then(|u| u.user_name.as_deref()),
            Some("gone@example.com")
        );
    }

    #[test]
    fn test_location_users_serialize_skips_unset() {
        let model = LocationUsersModel {
            users: vec![LocationUser {
                id: 9,
                location_access: LocationAccessLevel::Control,
                temporary: false,
                category: 1,
                nickname: None,
                schedules: None,
            }],
        };
        let value = serde_json::to_value(&model).expect("Failed to serialize location users");
        assert_eq!(
            value,
            serde_json::json!({"users": [{"id": 9, "locationAccess": 20, "temporary": false, "category": 1}]})
        );
    }

    #[test]
    fn test_narratives_query_pairs() {
        let query = NarrativesQuery {
            page_marker: Some("abc".to_string()),
            row_count: Some(20),
            priority: Some(NarrativePriority::Critical),
            ..Default::default()
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("pageMarker", "abc".to_string()),
                ("rowCount", "20".to_string()),
                ("priority", "3".to_string()),
            ]
        );
    }
}
