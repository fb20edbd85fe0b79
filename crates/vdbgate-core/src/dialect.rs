// SPDX-License-Identifier: Apache-2.0

//! Driver Dialect Registry
//!
//! Static mapping from a JDBC driver class name to the identifier of the
//! federation-engine translator that speaks that store's dialect. Lookups
//! are exact string matches; there is no fallback translator.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::error::{GatewayError, GatewayResult};
use crate::types::TranslatorBinding;

/// Driver class name → translator id.
///
/// Ingres is listed once: the Actian Vector translator shares its driver
/// class and the plain `ingres` translator is the one selected.
const TRANSLATOR_FOR_DRIVER: &[(&str, &str)] = &[
    ("com.ibm.db2.jcc.DB2Driver", "db2"),
    ("org.apache.derby.jdbc.AutoloadedDriver", "derby"),
    ("org.apache.derby.jdbc.ClientDriver", "derby"),
    ("org.h2.Driver", "h2"),
    ("com.sap.db.jdbc.Driver", "hana"),
    ("org.apache.hive.jdbc.HiveDriver", "hive"),
    ("org.apache.hadoop.hive.jdbc.HiveDriver", "impala"),
    ("org.hsqldb.jdbc.JDBCDriver", "hsql"),
    ("com.informix.jdbc.IfxDriver", "informix"),
    ("com.ingres.jdbc.IngresDriver", "ingres"),
    ("com.intersys.jdbc.CacheDriver", "intersystems-cache"),
    ("com.mysql.jdbc.Driver", "mysql5"),
    ("org.olap4j.driver.xmla.XmlaOlap4jDriver", "olap"),
    ("mondrian.olap4j.MondrianOlap4jDriver", "olap"),
    ("oracle.jdbc.OracleDriver", "oracle"),
    ("com.osisoft.jdbc.Driver", "osisoft-pi"),
    ("org.apache.phoenix.jdbc.PhoenixDriver", "phoenix"),
    ("org.postgresql.Driver", "postgresql"),
    ("com.facebook.presto.jdbc.PrestoDriver", "prestodb"),
    ("com.microsoft.sqlserver.jdbc.SQLServerDriver", "sqlserver"),
    ("net.sourceforge.jtds.jdbc.Driver", "sqlserver"),
    ("com.sybase.jdbc2.jdbc.SybDriver", "sybase"),
    ("com.sybase.jdbc4.jdbc.SybDriver", "sybase"),
    ("net.ucanaccess.jdbc.UcanaccessDriver", "ucanaccess"),
    ("com.vertica.jdbc.Driver", "vertica"),
];

static INDEX: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

fn index() -> &'static HashMap<&'static str, &'static str> {
    INDEX.get_or_init(|| TRANSLATOR_FOR_DRIVER.iter().copied().collect())
}

/// Looks up the translator for a driver class name.
pub fn resolve(driver_class_name: &str) -> Option<&'static str> {
    index().get(driver_class_name).copied()
}

/// Like [`resolve`], but reports a miss as a `DialectResolution` error.
pub fn resolve_translator(driver_class_name: &str) -> GatewayResult<&'static str> {
    resolve(driver_class_name).ok_or_else(|| GatewayError::dialect_not_found(driver_class_name))
}

/// All bindings in registration order.
pub fn bindings() -> impl Iterator<Item = TranslatorBinding> {
    TRANSLATOR_FOR_DRIVER
        .iter()
        .map(|(driver, translator)| TranslatorBinding::new(*driver, *translator))
}

/// Driver class names that have a translator.
pub fn driver_classes() -> impl Iterator<Item = &'static str> {
    TRANSLATOR_FOR_DRIVER.iter().map(|(driver, _)| *driver)
}

/// Distinct translator ids, sorted.
pub fn known_translators() -> Vec<&'static str> {
    TRANSLATOR_FOR_DRIVER
        .iter()
        .map(|(_, translator)| *translator)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
