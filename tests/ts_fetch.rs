mod helpers;

use anyhow::Result;
use riak_async::commands::FetchRow;
use riak_async::operations::ts::fetch::Builder;
use riak_async::proto::code;
use riak_async::proto::ts::{TsCell, TsColumnDescription, TsColumnType, TsGetReq, TsGetResp, TsRow};
use riak_async::timeseries::Cell;
use riak_async::Error;
use std::time::Duration;

fn columns() -> Vec<TsColumnDescription> {
    vec![
        TsColumnDescription {
            name: b"col1".to_vec(),
            r#type: TsColumnType::Sint64 as i32,
        },
        TsColumnDescription {
            name: b"col2".to_vec(),
            r#type: TsColumnType::Varchar as i32,
        },
    ]
}

fn row(cells: &[Cell]) -> TsRow {
    TsRow {
        cells: cells.iter().map(TsCell::from).collect(),
    }
}

#[tokio::test]
async fn test_fetch_row() -> Result<()> {
    let (node, mut fake) = helpers::connect();
    let builder = Builder::new("weather", [Cell::from(1_i64), Cell::from("a")])?;
    let future = FetchRow::new(builder).execute_async(&node);

    let request: TsGetReq = fake.request(code::TS_GET_REQ).await?;
    assert_eq!(request.table, b"weather");
    assert_eq!(
        request.key,
        [TsCell::from(&Cell::Sint64(1)), TsCell::from(&Cell::from("a"))]
    );
    assert_eq!(request.timeout, None);

    let response = TsGetResp {
        columns: columns(),
        rows: vec![row(&[Cell::from(1_i64), Cell::from("a")])],
    };
    fake.respond(code::TS_GET_RESP, &response).await?;

    let completed = future.await?;
    let fetched = completed.response.ok_or_else(|| anyhow::anyhow!("no row"))?;
    assert_eq!(fetched.get("col1"), Some(&Cell::Sint64(1)));
    assert_eq!(fetched.get("col2"), Some(&Cell::from("a")));
    assert_eq!(
        completed.info,
        "SELECT * FROM weather WHERE PRIMARY KEY = { 1, a }"
    );
    Ok(())
}

#[tokio::test]
async fn test_fetch_missing_row() -> Result<()> {
    let (node, mut fake) = helpers::connect();
    let key = [Cell::from("hash1"), Cell::timestamp(1_443_806_600_000)];
    let builder = Builder::new("weather", key)?.with_timeout(Duration::from_millis(250))?;
    let future = FetchRow::new(builder).execute_async(&node);

    let request: TsGetReq = fake.request(code::TS_GET_REQ).await?;
    assert_eq!(request.timeout, Some(250));

    let response = TsGetResp {
        columns: columns(),
        rows: Vec::new(),
    };
    fake.respond(code::TS_GET_RESP, &response).await?;

    let completed = future.await?;
    assert_eq!(completed.response, None);
    assert_eq!(
        completed.info,
        "SELECT * FROM weather WHERE PRIMARY KEY = { hash1, 1443806600000 }"
    );
    Ok(())
}

#[tokio::test]
async fn test_cells_with_several_values_are_protocol_errors() -> Result<()> {
    let (node, mut fake) = helpers::connect();
    let builder = Builder::new("weather", [Cell::from(1_i64)])?;
    let future = FetchRow::new(builder).execute_async(&node);

    let _request: TsGetReq = fake.request(code::TS_GET_REQ).await?;
    let ambiguous = TsCell {
        sint64_value: Some(1),
        boolean_value: Some(true),
        ..TsCell::default()
    };
    let response = TsGetResp {
        columns: columns(),
        rows: vec![TsRow {
            cells: vec![ambiguous, TsCell::from(&Cell::from("a"))],
        }],
    };
    fake.respond(code::TS_GET_RESP, &response).await?;

    assert!(matches!(future.await, Err(Error::Protocol(_))));
    Ok(())
}

#[tokio::test]
async fn test_several_rows_fail_the_conversion() -> Result<()> {
    let (node, mut fake) = helpers::connect();
    let builder = Builder::new("weather", [Cell::from(1_i64)])?;
    let future = FetchRow::new(builder).execute_async(&node);

    let _request: TsGetReq = fake.request(code::TS_GET_REQ).await?;
    let cells = [Cell::from(1_i64), Cell::Null];
    let response = TsGetResp {
        columns: columns(),
        rows: vec![row(&cells), row(&cells)],
    };
    fake.respond(code::TS_GET_RESP, &response).await?;

    assert!(matches!(future.await, Err(Error::Conversion(_))));
    Ok(())
}

#[tokio::test]
async fn test_unexpected_response_codes_are_protocol_errors() -> Result<()> {
    let (node, mut fake) = helpers::connect();
    let builder = Builder::new("weather", [Cell::from(1_i64)])?;
    let future = FetchRow::new(builder).execute_async(&node);

    let _request: TsGetReq = fake.request(code::TS_GET_REQ).await?;
    fake.respond_raw(code::LIST_BUCKETS_RESP, &[]).await?;

    assert!(matches!(future.await, Err(Error::Protocol(_))));
    Ok(())
}

#[test]
fn test_invalid_builders_are_rejected() {
    assert!(matches!(
        Builder::new("", [Cell::from(1_i64)]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        Builder::new("weather", Vec::<Cell>::new()),
        Err(Error::InvalidArgument(_))
    ));
}
