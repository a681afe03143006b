#[cfg(test)]
mod tests {
    use quarry_core::{AsValue, EntityReference, OptionValue, Value};
    use rust_decimal::Decimal;
    use std::cmp::Ordering;
    use time::macros::{date, datetime};
    use uuid::Uuid;

    const ID: &str = "6f0c1a2b-3c4d-4e5f-8a9b-0c1d2e3f4a5b";

    fn id() -> Uuid {
        Uuid::parse_str(ID).unwrap()
    }

    #[test]
    fn value_null() {
        assert!(Value::Null.is_null());
        assert!(Value::Varchar(None).is_null());
        assert!(!Value::Varchar(Some("".into())).is_null());
        assert_eq!(Value::Int32(Some(5)).as_null(), Value::Int32(None));
        assert_eq!(Value::Null.as_null(), Value::Null);
        assert!(Value::Money(None).same_type(&Value::Money(Some(Decimal::ONE))));
        assert!(!Value::Money(None).same_type(&Value::Decimal(None)));
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert!(!Value::Varchar(None).loose_eq(&Value::Varchar(None)));
        assert!(!Value::Int32(Some(1)).loose_eq(&Value::Int32(None)));
    }

    #[test]
    fn value_compare_numbers() {
        assert!(Value::Int32(Some(3)).loose_eq(&Value::Decimal(Some(Decimal::new(300, 2)))));
        assert!(Value::Int64(Some(7)).loose_eq(&Value::Float64(Some(7.0))));
        assert_eq!(
            Value::Int64(Some(5)).compare(&Value::Float64(Some(4.5))),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Varchar(Some(" 10 ".into())).compare(&Value::Int32(Some(9))),
            Some(Ordering::Greater)
        );
        assert!(Value::Boolean(Some(true)).loose_eq(&Value::Int32(Some(1))));
        assert_eq!(
            Value::Int32(Some(1)).compare(&Value::Varchar(Some("one".into()))),
            None
        );
    }

    #[test]
    fn value_compare_text() {
        assert!(Value::Varchar(Some("Rob".into())).loose_eq(&Value::Varchar(Some("ROB".into()))));
        assert_eq!(
            Value::Varchar(Some("alpha".into())).compare(&Value::Varchar(Some("Bravo".into()))),
            Some(Ordering::Less)
        );
        let role = Value::OptionSet(Some(OptionValue::labeled(1, "Decision Maker")));
        assert!(role.loose_eq(&Value::Varchar(Some("decision maker".into()))));
        assert!(Value::Varchar(Some("Decision Maker".into())).loose_eq(&role));
        assert!(role.loose_eq(&Value::Varchar(Some("1".into()))));
        assert!(role.loose_eq(&Value::Int32(Some(1))));
        assert_eq!(
            Value::OptionSet(Some(OptionValue::new(1))).compare(&Value::Varchar(Some("x".into()))),
            None
        );
    }

    #[test]
    fn value_compare_dates() {
        let day = Value::Date(Some(date!(2024 - 05 - 01)));
        assert!(day.loose_eq(&Value::Varchar(Some("2024-05-01".into()))));
        assert!(day.loose_eq(&Value::Timestamp(Some(datetime!(2024-05-01 18:30 UTC)))));
        assert_eq!(
            Value::Varchar(Some("2024-04-30".into())).compare(&day),
            Some(Ordering::Less)
        );
        let instant = Value::Timestamp(Some(datetime!(2024-05-01 10:00 UTC)));
        assert!(instant.loose_eq(&Value::Varchar(Some("2024-05-01T12:00:00+02:00".into()))));
        assert_eq!(
            instant.compare(&Value::Varchar(Some("yesterday".into()))),
            None
        );
    }

    #[test]
    fn value_compare_identifiers() {
        let reference = Value::Reference(Some(EntityReference::new("account", id())));
        assert!(reference.loose_eq(&Value::Uuid(Some(id()))));
        assert!(reference.loose_eq(&Value::Varchar(Some(ID.to_uppercase()))));
        assert!(!reference.loose_eq(&Value::Uuid(Some(Uuid::nil()))));
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Boolean(Some(false)).to_string(), "false");
        assert_eq!(
            Value::Money(Some(Decimal::new(123450, 2))).to_string(),
            "1234.50"
        );
        assert_eq!(
            Value::Date(Some(date!(2024 - 02 - 29))).to_string(),
            "2024-02-29"
        );
        assert_eq!(
            Value::Timestamp(Some(datetime!(2024-05-01 10:30 UTC))).to_string(),
            "2024-05-01T10:30:00Z"
        );
        assert_eq!(
            Value::OptionSet(Some(OptionValue::labeled(2, "Employee"))).to_string(),
            "2"
        );
        assert_eq!(
            Value::Reference(Some(EntityReference::new("account", id()).with_name("Acme")))
                .to_string(),
            ID
        );
    }

    #[test]
    fn as_value() {
        assert_eq!(42i32.as_value(), Value::Int32(Some(42)));
        assert_eq!(i32::as_empty_value(), Value::Int32(None));
        assert_eq!(i64::try_from_value(Value::Int32(Some(42))).unwrap(), 42);
        assert!(i32::try_from_value(Value::Int64(Some(i64::MAX))).is_err());
        assert_eq!(
            i32::try_from_value(Value::OptionSet(Some(OptionValue::new(3)))).unwrap(),
            3
        );
        assert!(bool::try_from_value(Value::Int32(Some(2))).unwrap());
        assert!(bool::try_from_value(Value::Varchar(Some("true".into()))).is_err());
        assert_eq!(
            String::try_from_value(Value::OptionSet(Some(OptionValue::labeled(1, "One"))))
                .unwrap(),
            "One"
        );
        assert_eq!(
            Decimal::try_from_value(Value::Money(Some(Decimal::new(5, 1)))).unwrap(),
            Decimal::new(5, 1)
        );
        assert_eq!(
            time::Date::try_from_value(Value::Varchar(Some("2024-05-01".into()))).unwrap(),
            date!(2024 - 05 - 01)
        );
        assert_eq!(
            Uuid::try_from_value(Value::Reference(Some(EntityReference::new("account", id()))))
                .unwrap(),
            id()
        );
        assert_eq!(
            Uuid::try_from_value(Value::Varchar(Some(ID.into()))).unwrap(),
            id()
        );
        assert_eq!(Option::<String>::None.as_value(), Value::Varchar(None));
        assert_eq!(
            Option::<i64>::try_from_value(Value::Int64(None)).unwrap(),
            None
        );
        assert_eq!(
            Option::<i64>::try_from_value(Value::Int64(Some(9))).unwrap(),
            Some(9)
        );
        let value: Value = 2.5f64.into();
        assert_eq!(value, Value::Float64(Some(2.5)));
        let value: Value = "text".into();
        assert_eq!(value, Value::Varchar(Some("text".into())));
    }
}
