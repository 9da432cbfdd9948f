//! End to end tests against the bundled SQLite driver.

use chrono::NaiveDate;
use sqlbind::{
    Blob, DataKind, DbType, Error, Indicator, Row, RowId, Session, Transaction, U16String, Var,
};

fn connect() -> Session {
    let _ = env_logger::builder().is_test(true).try_init();
    Session::open("sqlite3://db=:memory:").unwrap()
}

fn count(session: &mut Session, table: &str) -> i64 {
    let n = Var::new(0_i64);
    session
        .once(&format!("select count(*) from {table}"))
        .into(&n)
        .execute()
        .unwrap();
    n.get()
}

#[test]
fn scalar_round_trip() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();
    session
        .once("insert into t(v) values(:v)")
        .bind_val(42_i32)
        .execute()
        .unwrap();

    let v = Var::new(0_i32);
    let got_data = session.once("select v from t").into(&v).execute().unwrap();
    assert!(got_data);
    assert_eq!(42, v.get());
}

#[test]
fn bulk_insert_then_bulk_fetch() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();

    let input = Var::new((1000..1100).collect::<Vec<i32>>());
    let mut insert = session
        .once("insert into t(v) values(:v)")
        .bind_vec(&input)
        .statement()
        .unwrap();
    insert.execute().unwrap();
    assert_eq!(Some(100), insert.affected_rows().unwrap());
    drop(insert);

    let output = Var::new(vec![0_i32; 100]);
    let got_data = session
        .once("select v from t order by v")
        .into_vec(&output)
        .execute()
        .unwrap();
    assert!(got_data);
    assert_eq!(input.get(), output.get());
}

/// A parameter used twice binds both occurrences; the parser treats casts
/// and assignments as text, which the unit tests of the parser cover.
#[test]
fn named_parameter_used_twice() {
    let mut session = connect();
    let first = Var::new(0_i32);
    let second = Var::new(0_i32);
    let mut statement = session
        .once("select cast(:a as integer), cast(:a as integer)")
        .into(&first)
        .into(&second)
        .bind_val_named("a", 7_i32)
        .statement()
        .unwrap();
    assert_eq!(1, statement.parameter_names().len());
    assert_eq!("a", statement.parameter_names()[0]);
    assert!(statement.execute().unwrap());
    assert_eq!((7, 7), (first.get(), second.get()));
}

#[test]
fn null_with_indicator() {
    let mut session = connect();
    session
        .once("create table t(id integer, v integer)")
        .execute()
        .unwrap();
    session.once("insert into t(id) values(1)").execute().unwrap();

    let v = Var::new(17_i32);
    let ind = Var::new(Indicator::Ok);
    let got_data = session
        .once("select v from t")
        .into_ind(&v, &ind)
        .execute()
        .unwrap();
    assert!(got_data);
    assert_eq!(Indicator::Null, ind.get());
    // The variable stays untouched on NULL.
    assert_eq!(17, v.get());
}

#[test]
fn null_without_indicator_is_a_type_error() {
    let mut session = connect();
    session
        .once("create table t(id integer, v integer)")
        .execute()
        .unwrap();
    session.once("insert into t(id) values(1)").execute().unwrap();

    let v = Var::new(0_i32);
    let error = session
        .once("select v from t")
        .into(&v)
        .execute()
        .unwrap_err();
    assert!(matches!(error, Error::Type(_)));
}

#[test]
fn option_represents_null_without_an_indicator() {
    let mut session = connect();
    session
        .once("create table t(id integer, v integer)")
        .execute()
        .unwrap();
    session.once("insert into t(id) values(1)").execute().unwrap();

    let v: Var<Option<i32>> = Var::new(Some(5));
    session.once("select v from t").into(&v).execute().unwrap();
    assert_eq!(None, v.get());

    // And an Option binds NULL on the way in.
    let none: Option<i32> = None;
    session
        .once("insert into t(id, v) values(2, :v)")
        .bind_val(none)
        .execute()
        .unwrap();
    let nulls = Var::new(0_i64);
    session
        .once("select count(*) from t where v is null")
        .into(&nulls)
        .execute()
        .unwrap();
    assert_eq!(2, nulls.get());
}

#[test]
fn dynamic_row_describes_column_types() {
    let mut session = connect();
    session
        .once("create table people(id integer, name varchar(20))")
        .execute()
        .unwrap();
    session
        .once("insert into people(id, name) values(7, 'John')")
        .execute()
        .unwrap();

    let row = Var::new(Row::new());
    let mut statement = session
        .once("select id, name from people")
        .into_row(&row)
        .statement()
        .unwrap();
    assert!(statement.execute().unwrap());

    let row = row.borrow();
    assert_eq!(2, row.len());
    assert_eq!("id", row.properties(0).unwrap().name());
    assert_eq!(DbType::I32, row.properties(0).unwrap().db_type());
    assert_eq!(DataKind::Integer, row.properties(0).unwrap().data_kind());
    assert_eq!("name", row.properties(1).unwrap().name());
    assert_eq!(DbType::Text, row.properties(1).unwrap().db_type());
    assert_eq!(7_i32, row.get(0).unwrap());
    assert_eq!("John", row.get::<String>(1).unwrap());
    assert_eq!(7_i64, row.get_named("id").unwrap());
    assert_eq!(Indicator::Ok, row.indicator(0).unwrap());
}

#[test]
fn bulk_fetch_reports_end_of_rowset() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();
    session
        .once("insert into t(v) values(1), (2), (3)")
        .execute()
        .unwrap();

    let buf = Var::new(vec![0_i32; 2]);
    let mut statement = session
        .once("select v from t order by v")
        .into_vec(&buf)
        .statement()
        .unwrap();
    assert!(statement.execute().unwrap());
    assert_eq!(vec![1, 2], buf.get());
    // The last row arrives in a shrunken window.
    assert!(statement.fetch().unwrap());
    assert_eq!(vec![3], buf.get());
    assert!(!statement.fetch().unwrap());
}

#[test]
fn scalar_fetch_iterates_the_rowset() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();
    session
        .once("insert into t(v) values(1), (2), (3)")
        .execute()
        .unwrap();

    let v = Var::new(0_i32);
    let mut statement = session
        .once("select v from t order by v")
        .into(&v)
        .statement()
        .unwrap();
    let mut seen = Vec::new();
    let mut got_data = statement.execute().unwrap();
    while got_data {
        seen.push(v.get());
        got_data = statement.fetch().unwrap();
    }
    assert_eq!(vec![1, 2, 3], seen);
}

#[test]
fn bulk_fetch_into_a_range() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();
    session
        .once("insert into t(v) values(1), (2), (3)")
        .execute()
        .unwrap();

    let buf = Var::new(vec![0_i32; 10]);
    let end = Var::new(8_usize);
    session
        .once("select v from t order by v")
        .into_vec_range(&buf, 4, &end)
        .execute()
        .unwrap();
    // Three rows landed in the middle of the vector and the end shrank.
    assert_eq!(7, end.get());
    let buf = buf.get();
    assert_eq!(10, buf.len());
    assert_eq!([1, 2, 3], buf[4..7]);
    assert_eq!([0, 0, 0, 0], buf[..4]);
}

#[test]
fn bulk_fetch_with_indicators() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();
    session
        .once("insert into t(v) values(1), (null), (3)")
        .execute()
        .unwrap();

    let buf = Var::new(vec![0_i32; 3]);
    let inds = Var::new(vec![Indicator::Ok; 3]);
    session
        .once("select v from t")
        .into_vec_ind(&buf, &inds)
        .execute()
        .unwrap();
    assert_eq!(
        vec![Indicator::Ok, Indicator::Null, Indicator::Ok],
        inds.get()
    );
    assert_eq!(vec![1, 0, 3], buf.get());

    let buf = Var::new(vec![0_i32; 3]);
    let error = session
        .once("select v from t")
        .into_vec(&buf)
        .execute()
        .unwrap_err();
    assert!(matches!(error, Error::Type(_)));
}

#[test]
fn bulk_insert_with_null_indicators() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();

    let values = Var::new(vec![1_i32, 2, 3]);
    let inds = Var::new(vec![Indicator::Ok, Indicator::Null, Indicator::Ok]);
    session
        .once("insert into t(v) values(:v)")
        .bind_vec_ind(&values, &inds)
        .execute()
        .unwrap();

    let nulls = Var::new(0_i64);
    session
        .once("select count(*) from t where v is null")
        .into(&nulls)
        .execute()
        .unwrap();
    assert_eq!(1, nulls.get());
    assert_eq!(3, count(&mut session, "t"));
}

#[test]
fn mixing_binding_modes_is_rejected() {
    let mut session = connect();
    session
        .once("create table t(a integer, b integer)")
        .execute()
        .unwrap();
    let mut statement = session
        .once("insert into t(a, b) values(:a, :b)")
        .bind_val(1_i32)
        .bind_val_named("b", 2_i32)
        .statement()
        .unwrap();
    assert!(matches!(statement.execute().unwrap_err(), Error::Bind(_)));
}

#[test]
fn bulk_into_with_scalar_use_is_rejected() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();
    let out = Var::new(vec![0_i32; 10]);
    let mut statement = session
        .once("select v from t where v > :min")
        .into_vec(&out)
        .bind_val(0_i32)
        .statement()
        .unwrap();
    assert!(matches!(statement.execute().unwrap_err(), Error::Usage(_)));
}

#[test]
fn mixing_bulk_and_scalar_use_is_rejected() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();
    let many = vec![1_i32, 2, 3];
    let mut statement = session
        .once("insert into t(v) values(:v + :off)")
        .bind_vec_ref(&many)
        .bind_val(1_i32)
        .statement()
        .unwrap();
    assert!(matches!(statement.execute().unwrap_err(), Error::Usage(_)));
}

#[test]
fn bulk_use_with_into_elements_is_rejected() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();
    let many = vec![1_i32, 2, 3];
    let out = Var::new(0_i32);
    let mut statement = session
        .once("insert into t(v) values(:v)")
        .bind_vec_ref(&many)
        .into(&out)
        .statement()
        .unwrap();
    assert!(matches!(statement.execute().unwrap_err(), Error::Usage(_)));
}

#[test]
fn empty_bulk_vectors_are_rejected() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();
    let empty: Var<Vec<i32>> = Var::new(Vec::new());
    let mut statement = session
        .once("select v from t")
        .into_vec(&empty)
        .statement()
        .unwrap();
    assert!(matches!(statement.execute().unwrap_err(), Error::Usage(_)));
}

#[test]
fn binding_an_unknown_name_is_rejected() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();
    let mut statement = session
        .once("insert into t(v) values(:v)")
        .bind_val_named("missing", 1_i32)
        .statement()
        .unwrap();
    assert!(matches!(statement.execute().unwrap_err(), Error::Bind(_)));
}

#[test]
fn double_round_trip() {
    let mut session = connect();
    session.once("create table t(v real)").execute().unwrap();
    let input = 3.141592653589793_f64;
    session
        .once("insert into t(v) values(:v)")
        .bind_val(input)
        .execute()
        .unwrap();
    let v = Var::new(0.0_f64);
    session.once("select v from t").into(&v).execute().unwrap();
    assert_eq!(input, v.get());
}

#[test]
fn text_with_embedded_nul_round_trips() {
    let mut session = connect();
    session.once("create table t(v text)").execute().unwrap();
    let input = "ab\0cd".to_string();
    session
        .once("insert into t(v) values(:v)")
        .bind_val(input.clone())
        .execute()
        .unwrap();
    let v = Var::new(String::new());
    session.once("select v from t").into(&v).execute().unwrap();
    assert_eq!(input, v.get());
}

#[test]
fn wide_text_round_trips() {
    let mut session = connect();
    session.once("create table t(v text)").execute().unwrap();
    let input = U16String::from_str("grüße");
    session
        .once("insert into t(v) values(:v)")
        .bind_val(input.clone())
        .execute()
        .unwrap();
    let v = Var::new(U16String::new());
    session.once("select v from t").into(&v).execute().unwrap();
    assert_eq!(input, v.get());
}

#[test]
fn blob_round_trips_byte_exact() {
    let mut session = connect();
    session.once("create table t(v blob)").execute().unwrap();
    let input = vec![0_u8, 255, 1, 0, 128];
    session
        .once("insert into t(v) values(:v)")
        .bind_val(input.clone())
        .execute()
        .unwrap();
    let v: Var<Vec<u8>> = Var::new(Vec::new());
    session.once("select v from t").into(&v).execute().unwrap();
    assert_eq!(input, v.get());
}

#[test]
fn timestamp_round_trips_at_second_resolution() {
    let mut session = connect();
    session.once("create table t(v datetime)").execute().unwrap();
    let input = NaiveDate::from_ymd_opt(2008, 11, 22)
        .unwrap()
        .and_hms_opt(14, 17, 41)
        .unwrap();
    session
        .once("insert into t(v) values(:v)")
        .bind_val(input)
        .execute()
        .unwrap();
    let v = Var::new(
        NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
    );
    session.once("select v from t").into(&v).execute().unwrap();
    assert_eq!(input, v.get());
}

/// Values above the signed 64 bit range are exchanged as text, so they must
/// go into a text affinity column to survive byte exact.
#[test]
fn large_u64_round_trips_through_text() {
    let mut session = connect();
    session.once("create table t(v text)").execute().unwrap();
    let input = u64::MAX - 3;
    session
        .once("insert into t(v) values(:v)")
        .bind_val(input)
        .execute()
        .unwrap();
    let v = Var::new(0_u64);
    session.once("select v from t").into(&v).execute().unwrap();
    assert_eq!(input, v.get());
}

#[test]
fn char_round_trips() {
    let mut session = connect();
    session.once("create table t(v text)").execute().unwrap();
    session
        .once("insert into t(v) values(:v)")
        .bind_val('x')
        .execute()
        .unwrap();
    let v = Var::new(' ');
    session.once("select v from t").into(&v).execute().unwrap();
    assert_eq!('x', v.get());
}

#[test]
fn rollback_discards_the_transaction() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();
    session.once("insert into t(v) values(1)").execute().unwrap();

    session.begin().unwrap();
    session.once("insert into t(v) values(2)").execute().unwrap();
    session.rollback().unwrap();
    assert_eq!(1, count(&mut session, "t"));

    session.begin().unwrap();
    session.once("insert into t(v) values(2)").execute().unwrap();
    session.commit().unwrap();
    assert_eq!(2, count(&mut session, "t"));
}

#[test]
fn transaction_guard_rolls_back_on_drop() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();

    {
        let mut tx = Transaction::new(&mut session).unwrap();
        tx.once("insert into t(v) values(1)").execute().unwrap();
        // Dropped without commit.
    }
    assert_eq!(0, count(&mut session, "t"));

    let mut tx = Transaction::new(&mut session).unwrap();
    tx.once("insert into t(v) values(1)").execute().unwrap();
    tx.commit().unwrap();
    assert_eq!(1, count(&mut session, "t"));
}

#[test]
fn last_insert_id_reports_the_generated_key() {
    let mut session = connect();
    session
        .once("create table t(id integer primary key, v integer)")
        .execute()
        .unwrap();
    session.once("insert into t(v) values(10)").execute().unwrap();
    assert_eq!(Some(1), session.last_insert_id("t").unwrap());
    session.once("insert into t(v) values(11)").execute().unwrap();
    assert_eq!(Some(2), session.last_insert_id("t").unwrap());
    // sqlite has no sequences.
    assert_eq!(None, session.next_sequence_value("s").unwrap());
}

#[test]
fn repeated_execution_rebinds_changed_variables() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();

    let v = Var::new(1_i32);
    let mut statement = session
        .prepare("insert into t(v) values(:v)")
        .bind(&v)
        .statement()
        .unwrap();
    statement.execute().unwrap();
    v.set(2);
    statement.execute().unwrap();
    drop(statement);

    let values = Var::new(vec![0_i32; 10]);
    session
        .once("select v from t order by v")
        .into_vec(&values)
        .execute()
        .unwrap();
    assert_eq!(vec![1, 2], values.get());
}

#[test]
fn row_move_as_resets_the_holder() {
    let mut session = connect();
    session.once("create table t(name text)").execute().unwrap();
    session
        .once("insert into t(name) values('ada'), ('grace')")
        .execute()
        .unwrap();

    let row = Var::new(Row::new());
    let mut statement = session
        .once("select name from t order by name")
        .into_row(&row)
        .statement()
        .unwrap();
    assert!(statement.execute().unwrap());
    assert_eq!("ada", row.borrow_mut().move_as::<String>(0).unwrap());
    assert!(row.borrow().get::<Option<String>>(0).unwrap().is_none());
    // The next fetch repopulates the moved-out holder.
    assert!(statement.fetch().unwrap());
    assert_eq!("grace", row.borrow().get::<String>(0).unwrap());
}

#[test]
fn row_uppercases_names_on_request() {
    let mut session = connect();
    session.once("create table t(name text)").execute().unwrap();
    session.once("insert into t(name) values('x')").execute().unwrap();

    let row = Var::new(Row::new());
    row.borrow_mut().uppercase_column_names(true);
    session
        .once("select name from t")
        .into_row(&row)
        .execute()
        .unwrap();
    let row = row.borrow();
    assert_eq!("NAME", row.properties(0).unwrap().name());
    assert_eq!("x", row.get_named::<String>("NAME").unwrap());
}

#[test]
fn blob_handles_round_trip() {
    let mut session = connect();
    session.once("create table b(data blob)").execute().unwrap();

    let mut blob = Blob::new(&mut session).unwrap();
    blob.append(b"hello").unwrap();
    blob.write_from_start(b"H", 0).unwrap();
    assert_eq!(5, blob.len().unwrap());

    let blob = Var::new(blob);
    session
        .once("insert into b(data) values(:d)")
        .bind_blob(&blob)
        .execute()
        .unwrap();

    let fetched = Var::new(Blob::new(&mut session).unwrap());
    session
        .once("select data from b")
        .into_blob(&fetched)
        .execute()
        .unwrap();
    let mut buf = [0_u8; 5];
    assert_eq!(5, fetched.borrow_mut().read_from_start(&mut buf, 0).unwrap());
    assert_eq!(b"Hello", &buf);

    fetched.borrow_mut().trim(2).unwrap();
    assert_eq!(2, fetched.borrow_mut().len().unwrap());
}

#[test]
fn rowid_addresses_a_fetched_row() {
    let mut session = connect();
    session.once("create table t(v integer)").execute().unwrap();
    session
        .once("insert into t(v) values(1), (2)")
        .execute()
        .unwrap();

    let rid = Var::new(RowId::new(&mut session).unwrap());
    let v = Var::new(0_i32);
    session
        .once("select rowid, v from t where v = 2")
        .into_rowid(&rid)
        .into(&v)
        .execute()
        .unwrap();
    assert_eq!(2, v.get());
    assert!(rid.borrow().value().is_some());

    let again = Var::new(0_i32);
    session
        .once("select v from t where rowid = :r")
        .into(&again)
        .bind_rowid_named("r", &rid)
        .execute()
        .unwrap();
    assert_eq!(2, again.get());
}

#[test]
fn procedure_rewrites_and_executes() {
    let mut session = connect();
    let out = Var::new(0_i32);
    let mut procedure = session
        .prepare("select :a + 1")
        .bind_val_named("a", 1_i32)
        .into(&out)
        .procedure()
        .unwrap();
    assert!(procedure.execute().unwrap());
    assert_eq!(2, out.get());
    assert_eq!("select :a + 1", procedure.query());
}

#[test]
fn metadata_queries_list_tables_and_columns() {
    let mut session = connect();
    session
        .once("create table people(id integer not null, name varchar(20))")
        .execute()
        .unwrap();
    session.once("create table other(x text)").execute().unwrap();

    let mut tables = session.table_names().unwrap();
    tables.sort();
    assert_eq!(vec!["other".to_string(), "people".to_string()], tables);

    let columns = session.column_descriptions("people").unwrap();
    assert_eq!(2, columns.len());
    assert_eq!("id", columns[0].name);
    assert!(columns[0].type_name.to_lowercase().contains("int"));
    assert!(!columns[0].nullable);
    assert_eq!("name", columns[1].name);
    assert!(columns[1].nullable);
}

#[test]
fn session_exposes_dialect_helpers() {
    let session = connect();
    assert_eq!("", session.dummy_from_table());
    assert_eq!("ifnull", session.nvl_function());
    assert_eq!("x''", session.empty_blob_expr());
    assert_eq!(
        "varchar(20)",
        session.create_column_type(DbType::Text, 20, 0).unwrap()
    );
    assert_eq!("sqlite3", session.backend_name());
}

#[test]
fn invalid_statements_fail_to_prepare_with_a_native_code() {
    let mut session = connect();
    let error = session
        .once("selecty nonsense from nowhere")
        .statement()
        .err()
        .expect("preparing nonsense must fail");
    assert!(matches!(error, Error::Prepare { .. }));
    assert!(error.native_code().is_some());
}

#[test]
fn unknown_backend_names_are_rejected() {
    let error = Session::open("no-such-backend://x")
        .err()
        .expect("opening an unregistered backend must fail");
    assert!(matches!(error, Error::Connection { .. }));
}

#[test]
fn reconnect_reopens_the_same_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let mut session =
        Session::open_backend("sqlite3", &format!("db={}", path.display())).unwrap();
    session.once("create table t(v integer)").execute().unwrap();
    session.once("insert into t(v) values(1)").execute().unwrap();

    session.reconnect().unwrap();
    assert!(session.is_connected());
    assert_eq!(1, count(&mut session, "t"));
}

#[test]
fn connection_options_are_parsed() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session =
        Session::open_backend("sqlite3", "db=:memory: timeout=2 synchronous=off").unwrap();
    session.once("create table t(v integer)").execute().unwrap();
    assert_eq!(0, count(&mut session, "t"));

    let error = Session::open_backend("sqlite3", "db=:memory: nonsense=1")
        .err()
        .expect("unknown connection options must be rejected");
    assert!(matches!(error, Error::Connection { .. }));
}
