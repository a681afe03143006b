use futures::{StreamExt, stream};
use quarry::{
    AttributeMetadata, AttributeType, Catalog, ColumnSet, EntityMetadata, EntityReference,
    InputRecord, ItemOutcome, OptionValue, QueryBuilder, Reader, Record, Service, Value,
    WriteOptions, WritePipeline, WriteRequest,
};
use serde_json::json;
use uuid::Uuid;

pub fn account_metadata() -> EntityMetadata {
    EntityMetadata::new("account")
        .primary_name("name")
        .attribute(AttributeMetadata::new("name", AttributeType::String))
        .attribute(AttributeMetadata::new("accountnumber", AttributeType::String))
        .attribute(AttributeMetadata::new("revenue", AttributeType::Money))
        .attribute(
            AttributeMetadata::new("primarycontactid", AttributeType::Lookup).targets(["contact"]),
        )
}

pub fn contact_metadata() -> EntityMetadata {
    EntityMetadata::new("contact")
        .primary_name("fullname")
        .attribute(AttributeMetadata::new("firstname", AttributeType::String))
        .attribute(AttributeMetadata::new("lastname", AttributeType::String))
        .attribute(AttributeMetadata::new("fullname", AttributeType::String))
        .attribute(AttributeMetadata::new("description", AttributeType::Memo))
        .attribute(AttributeMetadata::new("emailaddress1", AttributeType::String))
        .attribute(AttributeMetadata::new("numberofchildren", AttributeType::Integer))
        .attribute(AttributeMetadata::new("creditlimit", AttributeType::Money))
        .attribute(AttributeMetadata::new("donotemail", AttributeType::Boolean))
        .attribute(AttributeMetadata::new("birthdate", AttributeType::DateTime).date_only())
        .attribute(
            AttributeMetadata::new("accountrolecode", AttributeType::Picklist).options([
                (1, "Decision Maker"),
                (2, "Employee"),
                (3, "Influencer"),
            ]),
        )
        .attribute(
            AttributeMetadata::new("parentcustomerid", AttributeType::Customer)
                .targets(["account", "contact"]),
        )
        .attribute(AttributeMetadata::new("createdon", AttributeType::DateTime).read_only())
}

/// Native contact with its first, last and full name.
pub fn contact(firstname: &str, lastname: &str) -> Record {
    Record::new("contact")
        .with("firstname", Value::Varchar(Some(firstname.into())))
        .with("lastname", Value::Varchar(Some(lastname.into())))
        .with(
            "fullname",
            Value::Varchar(Some(format!("{firstname} {lastname}"))),
        )
}

/// Native account named `name`.
pub fn account(name: &str) -> Record {
    Record::new("account").with("name", Value::Varchar(Some(name.into())))
}

pub fn role(code: i32) -> Value {
    Value::OptionSet(Some(OptionValue::new(code)))
}

pub fn parent(account: Uuid) -> Value {
    Value::Reference(Some(EntityReference::new("account", account)))
}

/// Loose input built from a JSON object.
pub fn input(value: serde_json::Value) -> InputRecord {
    InputRecord::from_json(value).expect("The input fixture must be a JSON object")
}

/// Loose contact input with first and last name.
pub fn contact_input(firstname: &str, lastname: &str) -> InputRecord {
    input(json!({ "firstname": firstname, "lastname": lastname }))
}

/// Create `records` through the service, returning their identities in order.
pub async fn seed<S: Service>(service: &S, records: impl IntoIterator<Item = Record>) -> Vec<Uuid> {
    let requests = records
        .into_iter()
        .map(WriteRequest::create)
        .collect::<Vec<_>>();
    let count = requests.len();
    let results = service
        .execute_multiple(requests)
        .await
        .expect("Failed to seed the records");
    assert_eq!(results.len(), count);
    results
        .into_iter()
        .map(|v| v.expect("Failed to create a seeded record").id)
        .collect()
}

/// Sorted full names of the contacts selected by `query`.
pub async fn full_names<S: Service>(service: &S, query: &QueryBuilder) -> Vec<String> {
    let catalog = Catalog::load(service, [&query.table])
        .await
        .expect("Failed to load the metadata");
    let query = query
        .build(&catalog)
        .expect("Failed to build the contact query");
    let mut result = Reader::new(service.clone(), query)
        .columns(["fullname"])
        .read_all()
        .await
        .expect("Failed to read the contacts")
        .into_iter()
        .map(|v| v["fullname"].as_str().unwrap_or_default().to_owned())
        .collect::<Vec<_>>();
    result.sort();
    result
}

/// Run a write pipeline over `inputs`, outcomes sorted by input then token.
pub async fn write<S: Service>(
    service: &S,
    entity: &str,
    options: WriteOptions,
    inputs: impl IntoIterator<Item = InputRecord>,
) -> Vec<ItemOutcome> {
    let inputs = inputs.into_iter().collect::<Vec<_>>();
    let mut result = WritePipeline::new(service.clone(), entity, options)
        .run(stream::iter(inputs))
        .await
        .expect("Failed to start the write pipeline")
        .collect::<Vec<_>>()
        .await;
    result.sort_by_key(|v| (v.input_index, v.token));
    result
}

/// Stored contact `id`, every attribute.
pub async fn stored<S: Service>(service: &S, id: Uuid) -> Record {
    service
        .retrieve("contact", id, &ColumnSet::All)
        .await
        .expect("Failed to retrieve the contact")
        .expect("The contact must exist")
}
