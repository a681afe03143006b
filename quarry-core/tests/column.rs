#[cfg(test)]
mod tests {
    use quarry_core::{
        AttributeMetadata, AttributeType, ColumnFormat, ColumnSpec, EntityMetadata, QuarryError,
        all_column_names,
    };

    #[test]
    fn column_spec() {
        assert_eq!(
            ColumnSpec::parse("fullname").unwrap(),
            ColumnSpec::new("fullname", ColumnFormat::Default)
        );
        assert_eq!(
            ColumnSpec::parse(" accountrolecode : display ").unwrap(),
            ColumnSpec::new("accountrolecode", ColumnFormat::Display)
        );
        assert_eq!(
            ColumnSpec::parse("parentcustomerid:RAW").unwrap(),
            ColumnSpec::new("parentcustomerid", ColumnFormat::Raw)
        );
        assert_eq!(
            ColumnSpec::parse("name:").unwrap(),
            ColumnSpec::new("name", ColumnFormat::Default)
        );
        let error = ColumnSpec::parse("name:Upper").unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::Format(..))
        ));
    }

    #[test]
    fn output_name() {
        assert_eq!(ColumnSpec::parse("fullname").unwrap().output_name(), "fullname");
        assert_eq!(
            ColumnSpec::parse("accountrolecode:display").unwrap().output_name(),
            "accountrolecode:Display"
        );
        assert_eq!(
            ColumnSpec::parse("parentcustomerid:Raw").unwrap().output_name(),
            "parentcustomerid:Raw"
        );
    }

    #[test]
    fn all_columns() {
        let mut secret = AttributeMetadata::new("secret", AttributeType::String);
        secret.valid_for_read = false;
        let metadata = EntityMetadata::new("contact")
            .attribute(AttributeMetadata::new("lastname", AttributeType::String))
            .attribute(AttributeMetadata::new("firstname", AttributeType::String))
            .attribute(AttributeMetadata::new("createdon", AttributeType::DateTime).read_only())
            .attribute(secret);
        assert_eq!(
            all_column_names(&metadata, false, &[] as &[&str]),
            ["contactid", "firstname", "lastname"]
        );
        assert_eq!(
            all_column_names(&metadata, true, &["FIRSTNAME"]),
            ["contactid", "createdon", "lastname"]
        );
    }
}
