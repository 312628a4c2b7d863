#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use yggdrasil::config::AppConfig;
use yggdrasil::database::{establish_connection, migrations::Migrator};
use yggdrasil::storage::MemoryBlobStore;
use yggdrasil::AppContext;

pub const FAMILY_GED: &str = "\
0 HEAD
1 SOUR TEST
1 CHAR UTF-8
0 @S1@ SOUR
1 TITL Parish register of St. Mary
1 AUTH Rev. Clark
0 @N1@ NOTE Emigrated in spring
1 CONT and settled by the river.
0 @I1@ INDI
1 NAME John /Smith/
1 SEX M
1 BIRT
2 DATE 1 JAN 1900
2 PLAC Springfield
1 DEAT
2 DATE 1970
1 SOUR @S1@
1 NOTE @N1@
0 @I2@ INDI
1 NAME Jane /Doe/
1 SEX F
1 BIRT
2 DATE ABT 1902
2 PLAC Shelbyville
0 @I3@ INDI
1 NAME Tom /Smith/
1 SEX M
1 BIRT
2 DATE 3 MAR 1925
2 PLAC Springfield
1 BURI
2 PLAC Springfield
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
1 CHIL @I3@
1 CHIL @I99@
1 MARR
2 DATE 12 JUN 1924
2 PLAC Springfield
1 NOTE Married at the old chapel
0 TRLR
";

pub async fn memory_db() -> Result<DatabaseConnection> {
    let db = establish_connection("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn memory_context() -> Result<(AppContext, Arc<MemoryBlobStore>)> {
    let db = memory_db().await?;
    let store = Arc::new(MemoryBlobStore::new());
    let context = AppContext::new(db, store.clone(), &AppConfig::default());
    Ok((context, store))
}
