use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sql::{
        parser::ast::{self, Expression},
        schema::{Index, Table, View},
        types::{DataType, Row, Value},
    },
    storage::engine::Engine as StorageEngine,
};

use super::{Engine, Transaction};

/// Key-value store backed SQL engine. The storage engine sits behind a
/// mutex so cloned engines and their sessions all see one store.
pub struct KVEngine<E: StorageEngine> {
    pub kv: Arc<Mutex<E>>,
}

impl<E: StorageEngine> Clone for KVEngine<E> {
    fn clone(&self) -> Self {
        Self {
            kv: self.kv.clone(),
        }
    }
}

impl<E: StorageEngine> KVEngine<E> {
    pub fn new(engine: E) -> Self {
        Self {
            kv: Arc::new(Mutex::new(engine)),
        }
    }
}

impl<E: StorageEngine> Engine for KVEngine<E> {
    type Transaction = KVTransaction<E>;

    fn begin(&self) -> Result<Self::Transaction> {
        Ok(Self::Transaction::new(self.kv.clone()))
    }
}

/// Key-value transaction. Statements run strictly one after another, so
/// this is pass-through access to the store; commit flushes and is the
/// durability point.
pub struct KVTransaction<E: StorageEngine> {
    engine: Arc<Mutex<E>>,
}

impl<E: StorageEngine> KVTransaction<E> {
    pub fn new(engine: Arc<Mutex<E>>) -> Self {
        Self { engine }
    }

    fn set(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.engine.lock()?.set(key, value)
    }

    fn get(&self, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
        self.engine.lock()?.get(key)
    }

    fn scan_prefix(&self, prefix: Vec<u8>) -> Result<Vec<ScanResult>> {
        let mut eng = self.engine.lock()?;
        let mut iter = eng.scan_prefix(prefix);
        let mut results = Vec::new();
        while let Some((key, value)) = iter.next().transpose()? {
            results.push(ScanResult { key, value });
        }
        Ok(results)
    }

    fn next_row_id(&self, table_name: &str) -> Result<u64> {
        let key = bincode::serialize(&Key::NextRowId(table_name.to_string()))?;
        let id = match self.get(key.clone())? {
            Some(v) => bincode::deserialize(&v)?,
            None => 1,
        };
        self.set(key, bincode::serialize(&(id + 1))?)?;
        Ok(id)
    }

    /// Builds the storage key for one index entry. The row id tail keeps
    /// entries unique when several rows share the indexed values; lookups
    /// strip it back off.
    fn index_entry_key(index: &Index, table: &Table, row: &Row, id: [u8; 8]) -> Result<Vec<u8>> {
        let mut key = bincode::serialize(&Key::IndexEntry(index.name.clone()))?;
        for col in &index.columns {
            let i = table.get_col_index(col)?;
            key.extend(bincode::serialize(&row[i])?);
        }
        key.extend(id);
        Ok(key)
    }
}

impl<E: StorageEngine> Transaction for KVTransaction<E> {
    fn commit(&self) -> Result<()> {
        self.engine.lock()?.flush()
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }

    fn create_row(&mut self, table_name: String, row: Row) -> Result<()> {
        let table = self.must_get_table(table_name)?;
        if row.len() != table.columns.len() {
            return Err(Error::Internal(format!(
                "row size does not match table {}",
                table.name
            )));
        }

        let mut row = row;
        for (i, col) in table.columns.iter().enumerate() {
            // integer literals are accepted for float columns
            if col.datatype == DataType::Float {
                if let Value::Integer(v) = row[i] {
                    row[i] = Value::Float(v as f64);
                }
            }
            match row[i].datatype() {
                None if col.nullable => {}
                None => {
                    return Err(Error::Schema(format!(
                        "column {} cannot be null",
                        col.name
                    )));
                }
                Some(dt) if dt != col.datatype => {
                    return Err(Error::Schema(format!(
                        "column {} type mismatch, expected {}, got {}",
                        col.name, col.datatype, row[i]
                    )));
                }
                _ => {}
            }
        }

        // rows get engine-assigned ids, big-endian so id order and scan
        // order agree
        let id = self.next_row_id(&table.name)?.to_be_bytes();
        let key = Key::Row(table.name.clone(), id);
        self.set(bincode::serialize(&key)?, bincode::serialize(&row)?)?;

        for index in self.list_indexes()? {
            if index.table != table.name {
                continue;
            }
            self.set(Self::index_entry_key(&index, &table, &row, id)?, vec![])?;
        }
        Ok(())
    }

    fn scan_table(&self, table_name: String, filter: Option<Expression>) -> Result<Vec<Row>> {
        let table = self.must_get_table(table_name)?;
        let columns = table
            .columns
            .iter()
            .map(|c| c.name.clone())
            .collect::<Vec<_>>();
        let prefix = KeyPrefix::Row(table.name.clone());
        let results = self.scan_prefix(bincode::serialize(&prefix)?)?;

        let empty_cols = Vec::new();
        let empty_row = Row::new();
        let mut rows = Vec::new();
        for result in results {
            let row: Row = bincode::deserialize(&result.value)?;
            match &filter {
                Some(expr) => {
                    // a NULL predicate result drops the row, same as FALSE
                    match ast::evaluate_expr(expr, &columns, &row, &empty_cols, &empty_row)? {
                        Value::Boolean(true) => rows.push(row),
                        Value::Boolean(false) | Value::Null => {}
                        v => {
                            return Err(Error::Internal(format!(
                                "unexpected filter result {}",
                                v
                            )));
                        }
                    }
                }
                None => rows.push(row),
            }
        }
        Ok(rows)
    }

    fn create_table(&mut self, table: Table) -> Result<()> {
        if self.get_table(table.name.clone())?.is_some() {
            return Err(Error::Schema(format!(
                "table {} already exists",
                table.name
            )));
        }
        table.validate()?;

        let key = Key::Table(table.name.clone());
        self.set(bincode::serialize(&key)?, bincode::serialize(&table)?)?;
        Ok(())
    }

    fn get_table(&self, table_name: String) -> Result<Option<Table>> {
        let key = Key::Table(table_name);
        Ok(self
            .get(bincode::serialize(&key)?)?
            .map(|v| bincode::deserialize(&v))
            .transpose()?)
    }

    fn list_tables(&self) -> Result<Vec<Table>> {
        let mut tables = Vec::new();
        for result in self.scan_prefix(bincode::serialize(&KeyPrefix::Table)?)? {
            tables.push(bincode::deserialize(&result.value)?);
        }
        Ok(tables)
    }

    fn create_view(&mut self, view: View) -> Result<()> {
        if self.get_view(view.name.clone())?.is_some() {
            return Err(Error::Schema(format!("view {} already exists", view.name)));
        }
        let key = Key::View(view.name.clone());
        self.set(bincode::serialize(&key)?, bincode::serialize(&view)?)?;
        Ok(())
    }

    fn get_view(&self, view_name: String) -> Result<Option<View>> {
        let key = Key::View(view_name);
        Ok(self
            .get(bincode::serialize(&key)?)?
            .map(|v| bincode::deserialize(&v))
            .transpose()?)
    }

    fn list_views(&self) -> Result<Vec<View>> {
        let mut views = Vec::new();
        for result in self.scan_prefix(bincode::serialize(&KeyPrefix::View)?)? {
            views.push(bincode::deserialize(&result.value)?);
        }
        Ok(views)
    }

    fn create_index(&mut self, index: Index) -> Result<()> {
        let table = self.must_get_table(index.table.clone())?;
        if index.columns.is_empty() {
            return Err(Error::Schema(format!(
                "index {} has no columns",
                index.name
            )));
        }
        for col in &index.columns {
            table.get_col_index(col)?;
        }
        if self.get_index(index.name.clone())?.is_some() {
            return Err(Error::Schema(format!(
                "index {} already exists",
                index.name
            )));
        }

        let key = Key::Index(index.name.clone());
        self.set(bincode::serialize(&key)?, bincode::serialize(&index)?)?;

        // backfill entries for rows inserted before the index existed
        let prefix = KeyPrefix::Row(index.table.clone());
        for result in self.scan_prefix(bincode::serialize(&prefix)?)? {
            let row: Row = bincode::deserialize(&result.value)?;
            let id: [u8; 8] = result.key[result.key.len() - 8..].try_into()?;
            self.set(Self::index_entry_key(&index, &table, &row, id)?, vec![])?;
        }
        Ok(())
    }

    fn get_index(&self, index_name: String) -> Result<Option<Index>> {
        let key = Key::Index(index_name);
        Ok(self
            .get(bincode::serialize(&key)?)?
            .map(|v| bincode::deserialize(&v))
            .transpose()?)
    }

    fn list_indexes(&self) -> Result<Vec<Index>> {
        let mut indexes = Vec::new();
        for result in self.scan_prefix(bincode::serialize(&KeyPrefix::Index)?)? {
            indexes.push(bincode::deserialize(&result.value)?);
        }
        Ok(indexes)
    }

    fn index_lookup(&self, index: &Index, value: &Value) -> Result<Vec<Row>> {
        let table = self.must_get_table(index.table.clone())?;

        // the lookup value must serialize exactly like the stored one, so
        // it goes through the same coercion as create_row
        let mut value = value.clone();
        if let Some(col) = index.columns.first() {
            let i = table.get_col_index(col)?;
            if table.columns[i].datatype == DataType::Float {
                if let Value::Integer(v) = value {
                    value = Value::Float(v as f64);
                }
            }
        }

        let mut prefix = bincode::serialize(&Key::IndexEntry(index.name.clone()))?;
        prefix.extend(bincode::serialize(&value)?);

        let mut rows = Vec::new();
        for result in self.scan_prefix(prefix)? {
            let id: [u8; 8] = result.key[result.key.len() - 8..].try_into()?;
            let row_key = Key::Row(index.table.clone(), id);
            if let Some(v) = self.get(bincode::serialize(&row_key)?)? {
                rows.push(bincode::deserialize(&v)?);
            }
        }
        Ok(rows)
    }
}

/// One key/value pair out of a prefix scan
struct ScanResult {
    key: Vec<u8>,
    value: Vec<u8>,
}

/// Key types for KV storage operations
#[derive(Debug, Serialize, Deserialize)]
enum Key {
    Table(String),
    View(String),
    Index(String),
    NextRowId(String),
    Row(String, [u8; 8]),
    IndexEntry(String),
}

/// Key prefix types for prefix scanning
///
/// In bincode, enums are serialized as [variant_index][variant_data...].
/// Variant indices start from 0 in definition order, so every variant here
/// must sit at the same index as its Key counterpart.
#[derive(Debug, Serialize, Deserialize)]
enum KeyPrefix {
    Table,
    View,
    Index,
    NextRowId,
    Row(String),
}

#[cfg(test)]
mod tests {
    use crate::{
        error::Result,
        sql::{
            engine::{Engine, Session},
            executor::ResultSet,
            types::Value,
        },
        storage::{disk::DiskEngine, memory::MemoryEngine},
    };

    use super::KVEngine;

    fn setup() -> Result<Session<KVEngine<MemoryEngine>>> {
        let kvengine = KVEngine::new(MemoryEngine::new());
        let mut s = kvengine.session()?;
        s.execute(
            "create table car_prices (
                year integer,
                make text,
                model text,
                sellingprice float
            );",
        )?;
        s.execute("insert into car_prices values (2015, 'toyota', 'camry', 21000.0);")?;
        s.execute("insert into car_prices values (2014, 'toyota', 'corolla', 19000.0);")?;
        s.execute("insert into car_prices values (2015, 'bmw', 'x5', 35000.0);")?;
        s.execute("insert into car_prices values (2014, 'bmw', '3 series', 25000.0);")?;
        s.execute("insert into car_prices values (2016, 'kia', 'sorento', 21500.0);")?;
        Ok(s)
    }

    fn rows(result: ResultSet) -> (Vec<String>, Vec<Vec<Value>>) {
        match result {
            ResultSet::Scan { columns, rows } => (columns, rows),
            other => panic!("expected scan result, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_defaults_and_nulls() -> Result<()> {
        let kvengine = KVEngine::new(MemoryEngine::new());
        let mut s = kvengine.session()?;
        s.execute("create table t1 (a int, b text default 'vv', c integer default 100);")?;
        s.execute("insert into t1 values (1, 'a', 1);")?;
        s.execute("insert into t1 values (2, 'b');")?;
        s.execute("insert into t1 (c, a) values (200, 3);")?;

        let (columns, rows_) = rows(s.execute("select * from t1;")?);
        assert_eq!(
            columns,
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert_eq!(
            rows_,
            vec![
                vec![
                    Value::Integer(1),
                    Value::String("a".to_string()),
                    Value::Integer(1)
                ],
                vec![
                    Value::Integer(2),
                    Value::String("b".to_string()),
                    Value::Integer(100)
                ],
                vec![
                    Value::Integer(3),
                    Value::String("vv".to_string()),
                    Value::Integer(200)
                ],
            ]
        );

        // integers are accepted into float columns
        s.execute("create table t2 (p float);")?;
        s.execute("insert into t2 values (5);")?;
        let (_, prices) = rows(s.execute("select * from t2;")?);
        assert_eq!(prices, vec![vec![Value::Float(5.0)]]);

        // a non-nullable column rejects NULL
        s.execute("create table t3 (a int not null, b int);")?;
        assert!(s.execute("insert into t3 values (null, 1);").is_err());

        // a failed statement leaves the session usable
        assert!(s.execute("select * from missing;").is_err());
        let (_, again) = rows(s.execute("select * from t1;")?);
        assert_eq!(again.len(), 3);
        Ok(())
    }

    #[test]
    fn test_grouped_average() -> Result<()> {
        let mut s = setup()?;
        // NULL prices stay out of both sum and count
        s.execute("insert into car_prices values (2015, 'kia', 'rio', null);")?;

        let (columns, result) = rows(s.execute(
            "select make, round(avg(sellingprice), 2) as avg_price \
             from car_prices group by make order by avg_price desc;",
        )?);
        assert_eq!(columns, vec!["make".to_string(), "avg_price".to_string()]);
        assert_eq!(
            result,
            vec![
                vec![Value::String("bmw".to_string()), Value::Float(30000.0)],
                vec![Value::String("kia".to_string()), Value::Float(21500.0)],
                vec![Value::String("toyota".to_string()), Value::Float(20000.0)],
            ]
        );

        let (_, counts) = rows(s.execute(
            "select make, count(*) as cnt, count(sellingprice) as priced \
             from car_prices group by make order by make asc;",
        )?);
        assert_eq!(
            counts,
            vec![
                vec![
                    Value::String("bmw".to_string()),
                    Value::Integer(2),
                    Value::Integer(2)
                ],
                vec![
                    Value::String("kia".to_string()),
                    Value::Integer(2),
                    Value::Integer(1)
                ],
                vec![
                    Value::String("toyota".to_string()),
                    Value::Integer(2),
                    Value::Integer(2)
                ],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_above_average_subquery() -> Result<()> {
        let mut s = setup()?;
        // global mean is (21000 + 19000 + 35000 + 25000 + 21500) / 5 = 24300
        let (_, result) = rows(s.execute(
            "select model, sellingprice from car_prices \
             where sellingprice > (select avg(sellingprice) from car_prices) \
             order by sellingprice desc;",
        )?);
        assert_eq!(
            result,
            vec![
                vec![Value::String("x5".to_string()), Value::Float(35000.0)],
                vec![Value::String("3 series".to_string()), Value::Float(25000.0)],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_max_per_group_keeps_ties() -> Result<()> {
        let mut s = setup()?;
        // a second toyota at the make maximum
        s.execute("insert into car_prices values (2016, 'toyota', 'avalon', 21000.0);")?;

        let (columns, result) = rows(s.execute(
            "select cp.make, cp.model, m.max_price from car_prices as cp \
             join (select make, max(sellingprice) as max_price \
                   from car_prices group by make) as m \
             on cp.make = m.make and cp.sellingprice = m.max_price \
             order by cp.make asc, cp.model asc;",
        )?);
        assert_eq!(
            columns,
            vec![
                "make".to_string(),
                "model".to_string(),
                "max_price".to_string()
            ]
        );
        assert_eq!(
            result,
            vec![
                vec![
                    Value::String("bmw".to_string()),
                    Value::String("x5".to_string()),
                    Value::Float(35000.0)
                ],
                vec![
                    Value::String("kia".to_string()),
                    Value::String("sorento".to_string()),
                    Value::Float(21500.0)
                ],
                vec![
                    Value::String("toyota".to_string()),
                    Value::String("avalon".to_string()),
                    Value::Float(21000.0)
                ],
                vec![
                    Value::String("toyota".to_string()),
                    Value::String("camry".to_string()),
                    Value::Float(21000.0)
                ],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_joins() -> Result<()> {
        let mut s = setup()?;
        s.execute("create table makes (make text, country text);")?;
        s.execute(
            "insert into makes values ('toyota', 'japan'), ('bmw', 'germany'), ('tesla', 'usa');",
        )?;

        // inner join drops kia (no match on the right)
        let (_, inner) = rows(s.execute(
            "select cp.model, mk.country from car_prices as cp \
             join makes as mk on cp.make = mk.make;",
        )?);
        assert_eq!(inner.len(), 4);

        // left join keeps kia with a NULL country
        let (_, left) = rows(s.execute(
            "select cp.model, mk.country from car_prices as cp \
             left join makes as mk on cp.make = mk.make;",
        )?);
        assert_eq!(left.len(), 5);
        assert!(left.contains(&vec![Value::String("sorento".to_string()), Value::Null]));
        assert!(left.len() >= inner.len());

        // right join runs as a left join with the sides swapped, so an
        // unmatched right-hand make survives with NULL padding
        let (columns, right) = rows(s.execute(
            "select mk.make, mk.country, cp.model from car_prices as cp \
             right join makes as mk on cp.make = mk.make;",
        )?);
        assert_eq!(
            columns,
            vec![
                "make".to_string(),
                "country".to_string(),
                "model".to_string()
            ]
        );
        assert_eq!(right.len(), 5);
        assert!(right.contains(&vec![
            Value::String("tesla".to_string()),
            Value::String("usa".to_string()),
            Value::Null
        ]));

        let (_, cross) = rows(s.execute("select * from car_prices cross join makes;")?);
        assert_eq!(cross.len(), 15);

        // an unqualified column living on both sides is ambiguous
        assert!(
            s.execute(
                "select make from car_prices as cp join makes as mk on cp.make = mk.make;"
            )
            .is_err()
        );
        Ok(())
    }

    #[test]
    fn test_view_always_fresh() -> Result<()> {
        let mut s = setup()?;
        s.execute(
            "create view v_make_year_summary as \
             select make, year, count(*) as cnt from car_prices group by make, year;",
        )?;
        let (_, before) = rows(s.execute("select * from v_make_year_summary;")?);
        assert_eq!(before.len(), 5);

        // the view reflects rows inserted after it was created
        s.execute("insert into car_prices values (2017, 'kia', 'soul', 15000.0);")?;
        let (_, after) = rows(s.execute("select * from v_make_year_summary;")?);
        assert_eq!(after.len(), 6);
        assert!(after.contains(&vec![
            Value::String("kia".to_string()),
            Value::Integer(2017),
            Value::Integer(1)
        ]));

        // the view equals re-running its definition directly
        let (_, direct) = rows(s.execute(
            "select make, year, count(*) as cnt from car_prices group by make, year;",
        )?);
        assert_eq!(after, direct);

        // views accept filters and projections like tables
        let (_, filtered) = rows(s.execute(
            "select make from v_make_year_summary where year = 2016;",
        )?);
        assert_eq!(filtered, vec![vec![Value::String("kia".to_string())]]);
        Ok(())
    }

    #[test]
    fn test_create_table_as_select() -> Result<()> {
        let mut s = setup()?;
        s.execute("insert into car_prices values (2015, 'toyota', 'camry', 22000.0);")?;

        let result = s.execute(
            "create table if not exists car_models as \
             select distinct make, model from car_prices;",
        )?;
        assert_eq!(
            result,
            ResultSet::CreateTable {
                table_name: "car_models".to_string(),
                created: true
            }
        );

        let (columns, models) = rows(s.execute("select * from car_models;")?);
        assert_eq!(columns, vec!["make".to_string(), "model".to_string()]);
        assert_eq!(models.len(), 5);

        // materialized once: later base-table inserts do not show up
        s.execute("insert into car_prices values (2012, 'honda', 'civic', 9000.0);")?;
        let (_, still) = rows(s.execute("select * from car_models;")?);
        assert_eq!(still.len(), 5);
        Ok(())
    }

    #[test]
    fn test_if_not_exists_is_idempotent() -> Result<()> {
        let mut s = setup()?;
        let ddl = [
            "create table if not exists car_specs (make text, body text);",
            "create view if not exists v_prices as select make, sellingprice from car_prices;",
            "create index if not exists idx_make_price on car_prices (make, sellingprice);",
        ];
        for sql in ddl {
            let first = s.execute(sql)?;
            let second = s.execute(sql)?;
            match (first, second) {
                (
                    ResultSet::CreateTable { created: c1, .. },
                    ResultSet::CreateTable { created: c2, .. },
                )
                | (
                    ResultSet::CreateView { created: c1, .. },
                    ResultSet::CreateView { created: c2, .. },
                )
                | (
                    ResultSet::CreateIndex { created: c1, .. },
                    ResultSet::CreateIndex { created: c2, .. },
                ) => {
                    assert!(c1);
                    assert!(!c2);
                }
                other => panic!("unexpected results {:?}", other),
            }
        }

        // without IF NOT EXISTS the duplicate is an error
        assert!(s.execute("create table car_specs (make text);").is_err());
        // tables and views share a namespace
        assert!(s.execute("create table v_prices (a int);").is_err());

        // the index exists exactly once
        let (_, indexes) = rows(s.execute("show indexes from car_prices;")?);
        assert_eq!(indexes.len(), 1);
        Ok(())
    }

    #[test]
    fn test_index_scan_matches_full_scan() -> Result<()> {
        let mut s = setup()?;
        let sql =
            "select model, sellingprice from car_prices where make = 'toyota' order by model asc;";
        let full = rows(s.execute(sql)?);

        s.execute("create index idx_make_price on car_prices (make, sellingprice);")?;
        let indexed = rows(s.execute(sql)?);
        assert_eq!(full, indexed);
        assert_eq!(indexed.1.len(), 2);

        // rows inserted after index creation are indexed too
        s.execute("insert into car_prices values (2013, 'toyota', 'prius', 12000.0);")?;
        let (_, with_new) = rows(s.execute(sql)?);
        assert_eq!(with_new.len(), 3);

        // the full predicate is re-checked on the candidate rows
        let (_, exact) = rows(s.execute(
            "select model from car_prices where make = 'toyota' and sellingprice > 15000.0;",
        )?);
        assert_eq!(exact.len(), 2);
        Ok(())
    }

    #[test]
    fn test_show_catalog() -> Result<()> {
        let mut s = setup()?;
        s.execute("create view v1 as select make from car_prices;")?;
        s.execute("create index idx_year on car_prices (year);")?;

        let (columns, tables) = rows(s.execute("show tables;")?);
        assert_eq!(columns, vec!["table".to_string()]);
        assert_eq!(tables, vec![vec![Value::String("car_prices".to_string())]]);

        let (_, views) = rows(s.execute("show views;")?);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0][0], Value::String("v1".to_string()));

        let (_, indexes) = rows(s.execute("show indexes;")?);
        assert_eq!(
            indexes,
            vec![vec![
                Value::String("idx_year".to_string()),
                Value::String("car_prices".to_string()),
                Value::String("year".to_string()),
            ]]
        );
        Ok(())
    }

    #[test]
    fn test_order_limit_offset() -> Result<()> {
        let mut s = setup()?;
        let (_, top) = rows(s.execute(
            "select model from car_prices order by sellingprice desc limit 2 offset 1;",
        )?);
        assert_eq!(
            top,
            vec![
                vec![Value::String("3 series".to_string())],
                vec![Value::String("sorento".to_string())],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_disk_engine_catalog_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("catalog.db");

        {
            let kvengine = KVEngine::new(DiskEngine::new(path.clone())?);
            let mut s = kvengine.session()?;
            s.execute("create table t (a integer, b text);")?;
            s.execute("insert into t values (1, 'x'), (2, 'y');")?;
            s.execute("create view v as select a from t;")?;
            s.execute("create index idx_a on t (a);")?;
        }

        let kvengine = KVEngine::new(DiskEngine::new(path)?);
        let mut s = kvengine.session()?;
        let (_, rows_) = rows(s.execute("select * from t;")?);
        assert_eq!(rows_.len(), 2);
        let (_, view_rows) = rows(s.execute("select * from v;")?);
        assert_eq!(view_rows.len(), 2);

        // IF NOT EXISTS schema statements are no-ops across a reopen
        match s.execute("create table if not exists t (a integer, b text);")? {
            ResultSet::CreateTable { created, .. } => assert!(!created),
            other => panic!("unexpected result {:?}", other),
        }
        match s.execute("create index if not exists idx_a on t (a);")? {
            ResultSet::CreateIndex { created, .. } => assert!(!created),
            other => panic!("unexpected result {:?}", other),
        }

        // the reopened index still narrows lookups
        let (_, hit) = rows(s.execute("select b from t where a = 2;")?);
        assert_eq!(hit, vec![vec![Value::String("y".to_string())]]);
        Ok(())
    }
}
