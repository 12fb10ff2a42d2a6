#![allow(clippy::panic)]
#![allow(clippy::expect_used)]

use assert_cmd::cargo::cargo_bin_cmd; // This is the macro, use it as cargo_bin_cmd!
use std::fs;

#[test]
fn import_is_not_implemented() {
    let mut cmd = cargo_bin_cmd!("lotledger");
    cmd.arg("import").arg("statement.ofx").assert().failure();
}

#[test]
fn load_then_dump_round_trips_lots() {
    let dir = tempfile::tempdir().expect("tempdir");
    let lots_csv = dir.path().join("lots.csv");
    fs::write(
        &lots_csv,
        "brokerid,acctid,ticker,secname,uniqueidtype,uniqueid,dtopen,units,cost,washcost\n\
         0,acct,AAPL,Apple,TICKER,AAPL,2005-10-03,300,3009.99,0\n",
    )
    .expect("write lots csv");

    let database = dir.path().join("db.json");
    let mut cmd = cargo_bin_cmd!("lotledger");
    cmd.arg("--database")
        .arg(&database)
        .arg("load")
        .arg(&lots_csv)
        .assert()
        .success();

    let dump_csv = dir.path().join("dump.csv");
    let mut cmd = cargo_bin_cmd!("lotledger");
    cmd.arg("--database")
        .arg(&database)
        .arg("lots")
        .arg(&dump_csv)
        .assert()
        .success();

    let dumped = fs::read_to_string(&dump_csv).expect("read dump");
    assert!(dumped.contains("AAPL"));
    assert!(dumped.contains("3009.99"));
}

#[test]
fn calc_processes_transactions_from_database_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let database = dir.path().join("db.json");
    let snapshot = serde_json::json!({
        "lots": [],
        "gains": [],
        "transactions": [
            {
                "id": 1,
                "account": "acct",
                "broker": "0",
                "dttrade": "2005-10-03T00:00:00",
                "kind": "buy",
                "security": "AAPL",
                "units": "300",
                "total": "-3009.99"
            },
            {
                "id": 2,
                "account": "acct",
                "broker": "0",
                "dttrade": "2005-12-01T00:00:00",
                "kind": "sell",
                "security": "AAPL",
                "units": "-200",
                "total": "2390.01"
            }
        ],
        "log": [],
        "next_lot_id": 0,
        "next_gain_id": 0
    });
    fs::write(&database, serde_json::to_string(&snapshot).expect("serialize")).expect("write snapshot");

    let mut cmd = cargo_bin_cmd!("lotledger");
    cmd.arg("--database").arg(&database).arg("calc").assert().success();

    let gains_csv = dir.path().join("gains.csv");
    let mut cmd = cargo_bin_cmd!("lotledger");
    cmd.arg("--database")
        .arg(&database)
        .arg("gains")
        .arg(&gains_csv)
        .assert()
        .success();

    let gains = fs::read_to_string(&gains_csv).expect("read gains");
    assert!(gains.contains("2390.01"));
    assert!(gains.contains("STCG"));
}
