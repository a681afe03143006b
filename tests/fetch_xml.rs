#[cfg(test)]
mod tests {
    use indoc::indoc;
    use quarry::{
        ColumnSet, ConditionExpression, ConditionOperator, FilterExpression, JoinType,
        LinkEntity, Order, OrderExpression, PageInfo, QuarryError, QueryExpression, Value,
    };

    fn query() -> QueryExpression {
        QueryExpression::new("contact")
            .columns(["fullname", "accountrolecode"].into_iter().collect())
            .order(OrderExpression::new("lastname", Order::DESC))
            .criteria(
                FilterExpression::and()
                    .condition(ConditionExpression::new(
                        "accountrolecode",
                        ConditionOperator::In,
                        [Value::Int32(Some(1)), Value::Int32(Some(3))],
                    ))
                    .filter(
                        FilterExpression::or()
                            .condition(ConditionExpression::equal("firstname", "Rob"))
                            .condition(ConditionExpression::null("lastname").with_alias("a")),
                    ),
            )
            .link(
                LinkEntity::new("contact", "parentcustomerid", "account", "accountid")
                    .alias("a")
                    .join_type(JoinType::LeftOuter)
                    .columns(["name"])
                    .criteria(
                        FilterExpression::and()
                            .condition(ConditionExpression::equal("name", "Acme & Co")),
                    ),
            )
            .top(50)
    }

    #[test]
    fn pretty() {
        assert_eq!(
            query().to_fetch_xml_pretty(),
            indoc! {r#"
                <fetch top="50">
                  <entity name="contact">
                    <attribute name="fullname"/>
                    <attribute name="accountrolecode"/>
                    <order attribute="lastname" descending="true"/>
                    <filter type="and">
                      <condition attribute="accountrolecode" operator="in">
                        <value>1</value>
                        <value>3</value>
                      </condition>
                      <filter type="or">
                        <condition attribute="firstname" operator="eq" value="Rob"/>
                        <condition entityname="a" attribute="lastname" operator="null"/>
                      </filter>
                    </filter>
                    <link-entity name="account" from="accountid" to="parentcustomerid" link-type="outer" alias="a">
                      <attribute name="name"/>
                      <filter type="and">
                        <condition attribute="name" operator="eq" value="Acme &amp; Co"/>
                      </filter>
                    </link-entity>
                  </entity>
                </fetch>
            "#}
            .trim()
        );
    }

    #[test]
    fn single_line() {
        assert_eq!(
            QueryExpression::new("account").to_fetch_xml(),
            r#"<fetch><entity name="account"><all-attributes/></entity></fetch>"#
        );
        let mut query = QueryExpression::new("account").columns(ColumnSet::Columns(Vec::new()));
        query.return_total_record_count = true;
        assert_eq!(
            query.to_fetch_xml(),
            r#"<fetch returntotalrecordcount="true"><entity name="account"></entity></fetch>"#
        );
        assert_eq!(query.to_string(), query.to_fetch_xml());
    }

    #[test]
    fn round_trip() {
        let query = query();
        let parsed = QueryExpression::from_fetch_xml(&query.to_fetch_xml_pretty()).unwrap();
        assert_eq!(parsed.to_fetch_xml_pretty(), query.to_fetch_xml_pretty());
        assert_eq!(parsed.link_entities, query.link_entities);
        assert_eq!(parsed.top, Some(50));
        assert_eq!(
            parsed.criteria.conditions[0].values,
            [
                Value::Varchar(Some("1".into())),
                Value::Varchar(Some("3".into()))
            ]
        );

        // Compact input with prolog and comments
        let parsed = QueryExpression::from_fetch_xml(indoc! {r#"
            <?xml version="1.0" encoding="utf-8"?>
            <!-- every active account -->
            <fetch count='2' page="3" paging-cookie="&lt;cookie page=&quot;2&quot;/&gt;">
              <entity name="account">
                <attribute name="name"/>
                <filter><condition attribute="statecode" operator="eq" value="0"/></filter>
              </entity>
            </fetch>
        "#})
        .unwrap();
        assert_eq!(
            parsed.page_info,
            Some(PageInfo {
                count: 2,
                page_number: 3,
                paging_cookie: Some(r#"<cookie page="2"/>"#.into()),
            })
        );
        assert_eq!(parsed.columns, ColumnSet::Columns(vec!["name".into()]));
        assert_eq!(parsed.criteria.to_string(), "(statecode Equal 0)");
        assert_eq!(
            parsed.to_fetch_xml(),
            concat!(
                r#"<fetch count="2" page="3" paging-cookie="&lt;cookie page=&quot;2&quot;/&gt;">"#,
                r#"<entity name="account"><attribute name="name"/><filter type="and">"#,
                r#"<condition attribute="statecode" operator="eq" value="0"/></filter>"#,
                r#"</entity></fetch>"#,
            )
        );
    }

    #[test]
    fn parse_errors() {
        let cases = [
            "",
            "<fetch>",
            "<fetch></fetch>",
            "<query><entity name=\"account\"/></query>",
            "<fetch><entity/></fetch>",
            "<fetch top=\"many\"><entity name=\"account\"/></fetch>",
            "<fetch><entity name=\"account\"><bogus/></entity></fetch>",
            "<fetch><entity name=\"account\"><filter type=\"xor\"/></entity></fetch>",
            "<fetch><entity name=\"account\"></fetch>",
            "<fetch><entity name=\"account\"/></fetch><fetch/>",
            "<fetch><entity name=\"a&nbsp;b\"/></fetch>",
        ];
        for case in cases {
            let error = QueryExpression::from_fetch_xml(case).expect_err(case);
            assert!(
                matches!(QuarryError::of(&error), Some(QuarryError::Format(..))),
                "{case}: {error:#}"
            );
        }
    }
}
