//! Uniform JSON response envelope.

use serde::Serialize;

use program_core::{ErrorKind, PaginatedResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// `{ data, pagination?, success, message?, kind? }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data,
            pagination: None,
            success: true,
            message: None,
            kind: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T> Envelope<Vec<T>> {
    pub fn paginated(result: PaginatedResult<T>) -> Self {
        let pagination = Pagination {
            page: result.page,
            limit: result.limit,
            total: result.total,
            total_pages: result.total_pages,
        };
        Self {
            pagination: Some(pagination),
            ..Self::ok(result.rows)
        }
    }
}

impl Envelope<serde_json::Value> {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            data: serde_json::Value::Null,
            pagination: None,
            success: false,
            message: Some(message.into()),
            kind: Some(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_envelope_omits_absent_fields() {
        let value = serde_json::to_value(Envelope::ok(json!({"id": 1}))).unwrap();
        assert_eq!(value, json!({"data": {"id": 1}, "success": true}));
    }

    #[test]
    fn paginated_envelope_carries_metadata() {
        let result = PaginatedResult {
            rows: vec!["a", "b"],
            page: 2,
            limit: 2,
            total: 5,
            total_pages: 3,
        };
        let value = serde_json::to_value(Envelope::paginated(result)).unwrap();
        assert_eq!(value["data"], json!(["a", "b"]));
        assert_eq!(
            value["pagination"],
            json!({"page": 2, "limit": 2, "total": 5, "total_pages": 3})
        );
    }

    #[test]
    fn error_envelope_has_null_data_and_kind() {
        let envelope = Envelope::error(ErrorKind::NotFound, "not found: program");
        let value = serde_json::to_value(envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "data": null,
                "success": false,
                "message": "not found: program",
                "kind": "not_found"
            })
        );
    }
}
