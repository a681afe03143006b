#[cfg(test)]
mod tests {
    use quarry_core::{
        AttributeMetadata, AttributeType, ColumnFormat, EntityReference, LooseValue,
        OptionValue, QuarryError, Value,
        convert::{from_native, reference_from_json, to_loose_untyped, to_native, to_native_untyped},
    };
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;
    use time::macros::{date, datetime};
    use uuid::Uuid;

    const ID: &str = "0b6c7d8e-1f20-4a3b-9c4d-5e6f7a8b9c0d";

    fn id() -> Uuid {
        Uuid::parse_str(ID).unwrap()
    }

    fn native(
        value: serde_json::Value,
        attribute: &AttributeMetadata,
    ) -> quarry_core::Result<Value> {
        to_native(&LooseValue::Json(value), attribute)
    }

    fn is_mismatch(result: quarry_core::Result<Value>) -> bool {
        match result {
            Ok(..) => false,
            Err(error) => matches!(
                QuarryError::of(&error),
                Some(QuarryError::TypeMismatch { .. })
            ),
        }
    }

    #[test]
    fn scalars() {
        let text = AttributeMetadata::new("description", AttributeType::Memo);
        assert_eq!(native(json!(5), &text).unwrap(), Value::Varchar(Some("5".into())));
        assert_eq!(native(json!(null), &text).unwrap(), Value::Varchar(None));
        assert!(is_mismatch(native(json!(["a"]), &text)));

        let count = AttributeMetadata::new("numberofchildren", AttributeType::Integer);
        assert_eq!(native(json!("42"), &count).unwrap(), Value::Int32(Some(42)));
        assert_eq!(native(json!(4.0), &count).unwrap(), Value::Int32(Some(4)));
        assert!(is_mismatch(native(json!(4.5), &count)));
        assert!(is_mismatch(native(json!("several"), &count)));
        assert!(is_mismatch(native(json!(3_000_000_000i64), &count)));

        let big = AttributeMetadata::new("population", AttributeType::BigInt);
        assert_eq!(
            native(json!(3_000_000_000i64), &big).unwrap(),
            Value::Int64(Some(3_000_000_000))
        );

        let ratio = AttributeMetadata::new("ratio", AttributeType::Double);
        assert_eq!(native(json!("0.25"), &ratio).unwrap(), Value::Float64(Some(0.25)));

        let money = AttributeMetadata::new("creditlimit", AttributeType::Money);
        assert_eq!(
            native(json!(12.3456), &money).unwrap(),
            Value::Money(Some(Decimal::new(1235, 2)))
        );
        let rate = AttributeMetadata::new("rate", AttributeType::Decimal).precision(3);
        assert_eq!(
            native(json!("1.23449"), &rate).unwrap(),
            Value::Decimal(Some(Decimal::new(1234, 3)))
        );

        let flag = AttributeMetadata::new("donotemail", AttributeType::Boolean);
        assert_eq!(native(json!("Yes"), &flag).unwrap(), Value::Boolean(Some(true)));
        assert_eq!(native(json!(0), &flag).unwrap(), Value::Boolean(Some(false)));
        assert!(is_mismatch(native(json!("maybe"), &flag)));
        let labeled = AttributeMetadata::new("donotemail", AttributeType::Boolean)
            .options([(0, "Allow"), (1, "Do Not Allow")]);
        assert_eq!(
            native(json!("do not allow"), &labeled).unwrap(),
            Value::Boolean(Some(true))
        );
    }

    #[test]
    fn dates() {
        let birthdate = AttributeMetadata::new("birthdate", AttributeType::DateTime).date_only();
        assert_eq!(
            native(json!("2024-05-01T10:00:00Z"), &birthdate).unwrap(),
            Value::Date(Some(date!(2024 - 05 - 01)))
        );
        let modified = AttributeMetadata::new("modifiedon", AttributeType::DateTime);
        assert_eq!(
            native(json!("2024-05-01"), &modified).unwrap(),
            Value::Timestamp(Some(datetime!(2024-05-01 0:00 UTC)))
        );
        assert_eq!(
            native(json!("2024-05-01 08:15"), &modified).unwrap(),
            Value::Timestamp(Some(datetime!(2024-05-01 8:15 UTC)))
        );
        assert!(is_mismatch(native(json!("someday"), &modified)));
        assert!(is_mismatch(native(json!(20240501), &modified)));
        assert_eq!(
            to_native(
                &LooseValue::Native(Value::Date(Some(date!(2024 - 05 - 01)))),
                &modified
            )
            .unwrap(),
            Value::Timestamp(Some(datetime!(2024-05-01 0:00 UTC)))
        );
    }

    #[test]
    fn option_sets() {
        let role = AttributeMetadata::new("accountrolecode", AttributeType::Picklist)
            .options([(1, "Decision Maker"), (2, "Employee")]);
        let employee = Value::OptionSet(Some(OptionValue::labeled(2, "Employee")));
        assert_eq!(native(json!("employee"), &role).unwrap(), employee);
        assert_eq!(native(json!(2), &role).unwrap(), employee);
        assert_eq!(native(json!("2"), &role).unwrap(), employee);
        assert_eq!(native(json!({ "Value": 2 }), &role).unwrap(), employee);
        assert!(is_mismatch(native(json!(7), &role)));
        assert!(is_mismatch(native(json!("Chief"), &role)));
        let open = AttributeMetadata::new("statuscode", AttributeType::Status);
        assert_eq!(
            native(json!(7), &open).unwrap(),
            Value::OptionSet(Some(OptionValue::new(7)))
        );
    }

    #[test]
    fn references() {
        let parent = AttributeMetadata::new("parentcustomerid", AttributeType::Customer)
            .targets(["account", "contact"]);
        assert_eq!(
            native(json!({ "Id": ID, "LogicalName": "account", "Name": "Acme" }), &parent)
                .unwrap(),
            Value::Reference(Some(EntityReference::new("account", id()).with_name("Acme")))
        );
        assert_eq!(
            native(json!({ "id": ID, "tablename": "contact" }), &parent).unwrap(),
            Value::Reference(Some(EntityReference::new("contact", id())))
        );
        assert!(is_mismatch(native(json!({ "Id": ID, "EntityName": "lead" }), &parent)));
        let error = native(json!(ID), &parent).unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::Format(..))
        ));
        let error = native(json!({ "TableName": "account" }), &parent).unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::Format(..))
        ));

        let owner = AttributeMetadata::new("primarycontactid", AttributeType::Lookup)
            .targets(["contact"]);
        assert_eq!(
            native(json!(ID), &owner).unwrap(),
            Value::Reference(Some(EntityReference::new("contact", id())))
        );
        assert_eq!(
            to_native(&LooseValue::Native(Value::Uuid(Some(id()))), &owner).unwrap(),
            Value::Reference(Some(EntityReference::new("contact", id())))
        );
        assert!(reference_from_json(None, &json!(ID)).is_err());

        let key = AttributeMetadata::new("contactid", AttributeType::Uniqueidentifier);
        assert_eq!(native(json!(ID), &key).unwrap(), Value::Uuid(Some(id())));
        let error = native(json!("nope"), &key).unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::Format(..))
        ));
    }

    #[test]
    fn untyped() {
        let untyped = |value| to_native_untyped(&LooseValue::Json(value)).unwrap();
        assert_eq!(untyped(json!(7)), Value::Int32(Some(7)));
        assert_eq!(untyped(json!(5_000_000_000i64)), Value::Int64(Some(5_000_000_000)));
        assert_eq!(untyped(json!(0.5)), Value::Float64(Some(0.5)));
        assert_eq!(untyped(json!("x")), Value::Varchar(Some("x".into())));
        assert_eq!(untyped(json!(null)), Value::Null);
        assert_eq!(
            untyped(json!({ "Id": ID, "TableName": "account" })),
            Value::Reference(Some(EntityReference::new("account", id())))
        );
        assert!(to_native_untyped(&LooseValue::Json(json!([1]))).is_err());
    }

    #[test]
    fn outputs() {
        let role = AttributeMetadata::new("accountrolecode", AttributeType::Picklist)
            .options([(1, "Decision Maker")]);
        let value = Value::OptionSet(Some(OptionValue::new(1)));
        assert_eq!(from_native(&value, &role, ColumnFormat::Default).unwrap(), json!(1));
        assert_eq!(from_native(&value, &role, ColumnFormat::Raw).unwrap(), json!(1));
        assert_eq!(
            from_native(&value, &role, ColumnFormat::Display).unwrap(),
            json!("Decision Maker")
        );

        let parent = AttributeMetadata::new("parentcustomerid", AttributeType::Customer)
            .targets(["account"]);
        let value = Value::Reference(Some(EntityReference::new("account", id())));
        assert_eq!(
            from_native(&value, &parent, ColumnFormat::Default).unwrap(),
            json!({ "Id": ID, "TableName": "account" })
        );
        assert_eq!(from_native(&value, &parent, ColumnFormat::Raw).unwrap(), json!(ID));
        assert_eq!(from_native(&value, &parent, ColumnFormat::Display).unwrap(), json!(ID));

        let money = AttributeMetadata::new("revenue", AttributeType::Money);
        let value = Value::Money(Some(Decimal::new(-123456789, 1)));
        assert_eq!(
            from_native(&value, &money, ColumnFormat::Display).unwrap(),
            json!("-12,345,678.90")
        );
        assert_eq!(
            from_native(&value, &money, ColumnFormat::Default).unwrap(),
            json!(-12345678.9)
        );
        let rate = AttributeMetadata::new("rate", AttributeType::Decimal).precision(10);
        let value = Value::Decimal(Some(Decimal::from_str("12345678901.1234567891").unwrap()));
        assert_eq!(
            from_native(&value, &rate, ColumnFormat::Default).unwrap(),
            json!("12345678901.1234567891")
        );
        assert_eq!(
            from_native(&Value::Decimal(Some(Decimal::new(1225, 2))), &rate, ColumnFormat::Raw)
                .unwrap(),
            json!(12.25)
        );
        let ratio = AttributeMetadata::new("ratio", AttributeType::Double);
        assert_eq!(
            from_native(&Value::Float64(Some(1e16)), &ratio, ColumnFormat::Display).unwrap(),
            json!("10,000,000,000,000,000")
        );
        assert_eq!(
            from_native(&Value::Float64(Some(-1234.5)), &ratio, ColumnFormat::Display).unwrap(),
            json!("-1,234.5")
        );
        assert_eq!(
            from_native(&Value::Float64(Some(1.5e-7)), &ratio, ColumnFormat::Display).unwrap(),
            json!("0.00000015")
        );
        let count = AttributeMetadata::new("employees", AttributeType::Integer);
        assert_eq!(
            from_native(&Value::Int32(Some(1234567)), &count, ColumnFormat::Display).unwrap(),
            json!("1,234,567")
        );
        assert_eq!(
            from_native(&Value::Int32(None), &count, ColumnFormat::Display).unwrap(),
            json!(null)
        );

        let modified = AttributeMetadata::new("modifiedon", AttributeType::DateTime);
        let value = Value::Timestamp(Some(datetime!(2024-05-01 10:30 +2)));
        assert_eq!(
            from_native(&value, &modified, ColumnFormat::Default).unwrap(),
            json!("2024-05-01T10:30:00+02:00")
        );
        assert_eq!(
            from_native(&value, &modified, ColumnFormat::Display).unwrap(),
            json!("2024-05-01 08:30")
        );

        let name = AttributeMetadata::new("fullname", AttributeType::String);
        let error = from_native(&Value::Varchar(None), &name, ColumnFormat::Display).unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::UnsupportedFormat { .. })
        ));
        assert_eq!(
            to_loose_untyped(&Value::Date(Some(date!(2024 - 05 - 01)))),
            json!("2024-05-01")
        );
    }

    #[test]
    fn native_round_trip() {
        let role = AttributeMetadata::new("accountrolecode", AttributeType::Picklist)
            .options([(1, "Decision Maker"), (2, "Employee")]);
        let primary = AttributeMetadata::new("primarycontactid", AttributeType::Lookup)
            .targets(["contact"]);
        let parent = AttributeMetadata::new("parentcustomerid", AttributeType::Customer)
            .targets(["account", "contact"]);
        let cases = [
            (
                AttributeMetadata::new("fullname", AttributeType::String),
                Value::Varchar(Some("Rob One".into())),
            ),
            (
                AttributeMetadata::new("description", AttributeType::Memo),
                Value::Varchar(None),
            ),
            (
                AttributeMetadata::new("numberofchildren", AttributeType::Integer),
                Value::Int32(Some(-42)),
            ),
            (
                AttributeMetadata::new("population", AttributeType::BigInt),
                Value::Int64(Some(9_007_199_254_740_993)),
            ),
            (
                AttributeMetadata::new("ratio", AttributeType::Double),
                Value::Float64(Some(0.1)),
            ),
            (
                AttributeMetadata::new("rate", AttributeType::Decimal).precision(10),
                Value::Decimal(Some(Decimal::from_str("12345678901.1234567891").unwrap())),
            ),
            (
                AttributeMetadata::new("rate", AttributeType::Decimal),
                Value::Decimal(Some(Decimal::new(12345, 2))),
            ),
            (
                AttributeMetadata::new("revenue", AttributeType::Money).precision(2),
                Value::Money(Some(Decimal::new(-1_234_567_890_123_456_789, 2))),
            ),
            (
                AttributeMetadata::new("revenue", AttributeType::Money).precision(2),
                Value::Money(None),
            ),
            (
                AttributeMetadata::new("donotemail", AttributeType::Boolean),
                Value::Boolean(Some(false)),
            ),
            (
                AttributeMetadata::new("birthdate", AttributeType::DateTime).date_only(),
                Value::Date(Some(date!(2024 - 02 - 29))),
            ),
            (
                AttributeMetadata::new("modifiedon", AttributeType::DateTime),
                Value::Timestamp(Some(datetime!(2024-05-01 10:30:15 +2))),
            ),
            (
                AttributeMetadata::new("contactid", AttributeType::Uniqueidentifier),
                Value::Uuid(Some(id())),
            ),
            (
                role,
                Value::OptionSet(Some(OptionValue::labeled(2, "Employee"))),
            ),
            (
                AttributeMetadata::new("statuscode", AttributeType::Status),
                Value::OptionSet(Some(OptionValue::new(7))),
            ),
            (
                primary,
                Value::Reference(Some(EntityReference::new("contact", id()))),
            ),
            (
                parent.clone(),
                Value::Reference(Some(EntityReference::new("account", id()).with_name("Acme"))),
            ),
        ];
        for (attribute, value) in cases {
            for format in [ColumnFormat::Default, ColumnFormat::Raw] {
                if format == ColumnFormat::Raw && attribute.targets.len() > 1 {
                    continue;
                }
                let loose = from_native(&value, &attribute, format).unwrap();
                let back = to_native(&LooseValue::Json(loose.clone()), &attribute)
                    .unwrap_or_else(|e| panic!("{} {format}: {e:#}", attribute.name()));
                assert_eq!(back, value, "{} {format}: {loose}", attribute.name());
            }
        }

        // The raw identifier of a reference to several tables loses the table
        let value = Value::Reference(Some(EntityReference::new("account", id())));
        let raw = from_native(&value, &parent, ColumnFormat::Raw).unwrap();
        let error = native(raw, &parent).unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::Format(..))
        ));
    }
}
