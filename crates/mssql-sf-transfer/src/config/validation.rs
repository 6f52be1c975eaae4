//! Per-field validation for transfer submissions.

use std::collections::BTreeMap;

use super::types::TransferRequest;

/// Validate a submission, returning a field → message map.
///
/// An empty map means the request is acceptable. The map feeds the 422
/// response body, so keys use the wire field names.
pub fn validate(req: &TransferRequest) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();

    let mut check = |ok: bool, field: &str| {
        if !ok {
            errors.insert(field.to_string(), "must be provided".to_string());
        }
    };

    check(!req.aws_config_s3_bucket.is_empty(), "aws_config_s3_bucket");
    check(!req.aws_config_s3_dir.is_empty(), "aws_config_s3_dir");
    check(!req.aws_config_region.is_empty(), "aws_config_region");
    check(!req.source_host.is_empty(), "source_host");
    check(req.source_port != 0, "source_port");
    check(!req.source_username.is_empty(), "source_username");
    check(!req.source_password.is_empty(), "source_password");
    check(!req.source_db_name.is_empty(), "source_db_name");
    check(!req.target_account_id.is_empty(), "target_account_id");
    check(!req.target_username.is_empty(), "target_username");
    check(
        !req.target_private_key_location.is_empty(),
        "target_private_key_location",
    );
    check(!req.target_role.is_empty(), "target_role");
    check(!req.target_warehouse.is_empty(), "target_warehouse");
    check(!req.target_aws_region.is_empty(), "target_aws_region");
    check(!req.target_db_name.is_empty(), "target_db_name");
    check(
        !req.target_storage_integration.is_empty(),
        "target_storage_integration",
    );
    check(!req.target_division_code.is_empty(), "target_division_code");
    check(!req.target_root_name.is_empty(), "target_root_name");

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::valid_request;

    #[test]
    fn test_valid_request_passes() {
        assert!(validate(&valid_request()).is_empty());
    }

    #[test]
    fn test_missing_fields_reported_by_name() {
        let mut req = valid_request();
        req.source_host.clear();
        req.target_role.clear();
        req.source_port = 0;

        let errors = validate(&req);
        assert_eq!(errors.len(), 3);
        assert_eq!(errors["source_host"], "must be provided");
        assert_eq!(errors["source_port"], "must be provided");
        assert_eq!(errors["target_role"], "must be provided");
    }

    #[test]
    fn test_empty_request_reports_every_required_field() {
        let errors = validate(&TransferRequest::default());
        assert_eq!(errors.len(), 18);
    }
}
