//! JDBC Driver Manager
//!
//! Ordered registry of JDBC drivers keyed by the URL prefixes they accept.
//! Resolving a connection URL to a driver class is the only discoverable
//! signal the gateway has for picking a translator.

use std::sync::Arc;

use vdbgate_core::dialect;

/// A JDBC driver known to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JdbcDriver {
    pub class_name: String,
    pub url_prefixes: Vec<String>,
    pub default_port: Option<u16>,
}

impl JdbcDriver {
    pub fn new(class_name: impl Into<String>, url_prefixes: &[&str]) -> Self {
        Self {
            class_name: class_name.into(),
            url_prefixes: url_prefixes.iter().map(|p| p.to_string()).collect(),
            default_port: None,
        }
    }

    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = Some(port);
        self
    }

    /// Returns true if this driver understands the URL
    pub fn accepts_url(&self, url: &str) -> bool {
        self.url_prefixes.iter().any(|p| url.starts_with(p.as_str()))
    }
}

/// (class name, url prefixes, default port) of every driver with a translator.
///
/// Order matters: the Derby network client is tried before the embedded
/// driver, whose prefix would also match network URLs.
const KNOWN_DRIVERS: &[(&str, &[&str], Option<u16>)] = &[
    ("org.h2.Driver", &["jdbc:h2:"], Some(9092)),
    ("org.postgresql.Driver", &["jdbc:postgresql:"], Some(5432)),
    ("com.mysql.jdbc.Driver", &["jdbc:mysql:"], Some(3306)),
    ("org.apache.derby.jdbc.ClientDriver", &["jdbc:derby://"], Some(1527)),
    ("org.apache.derby.jdbc.AutoloadedDriver", &["jdbc:derby:"], None),
    ("org.hsqldb.jdbc.JDBCDriver", &["jdbc:hsqldb:"], Some(9001)),
    ("oracle.jdbc.OracleDriver", &["jdbc:oracle:"], Some(1521)),
    ("com.microsoft.sqlserver.jdbc.SQLServerDriver", &["jdbc:sqlserver:"], Some(1433)),
    ("net.sourceforge.jtds.jdbc.Driver", &["jdbc:jtds:"], Some(1433)),
    ("com.ibm.db2.jcc.DB2Driver", &["jdbc:db2:"], Some(50000)),
    ("com.sap.db.jdbc.Driver", &["jdbc:sap:"], Some(30015)),
    ("org.apache.hive.jdbc.HiveDriver", &["jdbc:hive2:"], Some(10000)),
    ("org.apache.hadoop.hive.jdbc.HiveDriver", &["jdbc:hive:"], Some(10000)),
    ("com.informix.jdbc.IfxDriver", &["jdbc:informix-sqli:"], Some(9088)),
    ("com.ingres.jdbc.IngresDriver", &["jdbc:ingres:"], Some(21071)),
    ("com.intersys.jdbc.CacheDriver", &["jdbc:Cache:"], Some(1972)),
    ("org.olap4j.driver.xmla.XmlaOlap4jDriver", &["jdbc:xmla:"], None),
    ("mondrian.olap4j.MondrianOlap4jDriver", &["jdbc:mondrian:"], None),
    ("com.osisoft.jdbc.Driver", &["jdbc:pisql:"], None),
    ("org.apache.phoenix.jdbc.PhoenixDriver", &["jdbc:phoenix:"], Some(2181)),
    ("com.facebook.presto.jdbc.PrestoDriver", &["jdbc:presto:"], Some(8080)),
    ("com.sybase.jdbc4.jdbc.SybDriver", &["jdbc:sybase:"], Some(5000)),
    ("com.sybase.jdbc2.jdbc.SybDriver", &["jdbc:sybase:"], Some(5000)),
    ("net.ucanaccess.jdbc.UcanaccessDriver", &["jdbc:ucanaccess:"], None),
    ("com.vertica.jdbc.Driver", &["jdbc:vertica:"], Some(5433)),
];

/// Default port of the first known driver accepting `url`.
pub fn known_default_port(url: &str) -> Option<u16> {
    KNOWN_DRIVERS
        .iter()
        .find(|(_, prefixes, _)| prefixes.iter().any(|p| url.starts_with(p)))
        .and_then(|(_, _, port)| *port)
}

/// Registry that holds the JDBC drivers available to the gateway
#[derive(Debug, Default)]
pub struct DriverManager {
    drivers: Vec<Arc<JdbcDriver>>,
}

impl DriverManager {
    /// Creates a new empty manager
    pub fn new() -> Self {
        Self {
            drivers: Vec::new(),
        }
    }

    /// Creates a manager with a driver for every class the dialect registry knows
    pub fn with_known_drivers() -> Self {
        let mut manager = Self::new();
        for (class_name, prefixes, port) in KNOWN_DRIVERS {
            debug_assert!(dialect::resolve(class_name).is_some());
            let driver = JdbcDriver::new(*class_name, prefixes);
            manager.register(match port {
                Some(port) => driver.with_default_port(*port),
                None => driver,
            });
        }
        manager
    }

    /// Registers a driver
    ///
    /// A driver with the same class name replaces the earlier one in place,
    /// keeping its lookup priority.
    pub fn register(&mut self, driver: JdbcDriver) {
        let driver = Arc::new(driver);
        match self
            .drivers
            .iter_mut()
            .find(|d| d.class_name == driver.class_name)
        {
            Some(existing) => *existing = driver,
            None => self.drivers.push(driver),
        }
    }

    /// Finds the first driver accepting the URL
    pub fn driver_for_url(&self, url: &str) -> Option<Arc<JdbcDriver>> {
        self.drivers.iter().find(|d| d.accepts_url(url)).cloned()
    }

    /// Gets a driver by its class name
    pub fn get(&self, class_name: &str) -> Option<Arc<JdbcDriver>> {
        self.drivers
            .iter()
            .find(|d| d.class_name == class_name)
            .cloned()
    }

    /// Lists all registered driver class names
    pub fn list(&self) -> Vec<&str> {
        self.drivers.iter().map(|d| d.class_name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_basics() {
        let mut manager = DriverManager::new();
        assert!(manager.is_empty());

        manager.register(JdbcDriver::new("com.example.Driver", &["jdbc:example:"]));
        assert_eq!(manager.len(), 1);
        assert!(manager.get("com.example.Driver").is_some());
        assert!(manager.get("nonexistent").is_none());
    }

    #[test]
    fn test_known_drivers_cover_dialect_table() {
        let manager = DriverManager::with_known_drivers();
        for class_name in dialect::driver_classes() {
            assert!(
                manager.get(class_name).is_some(),
                "no driver registered for {class_name}"
            );
        }
        assert_eq!(manager.len(), 25);
    }

    #[test]
    fn test_driver_for_url() {
        let manager = DriverManager::with_known_drivers();
        let cases = [
            ("jdbc:h2:mem:projects", "org.h2.Driver"),
            ("jdbc:postgresql://localhost:5432/app", "org.postgresql.Driver"),
            ("jdbc:mysql://db/app", "com.mysql.jdbc.Driver"),
            ("jdbc:hsqldb:mem:licenses", "org.hsqldb.jdbc.JDBCDriver"),
            ("jdbc:hive2://hive:10000/default", "org.apache.hive.jdbc.HiveDriver"),
            ("jdbc:hive://hive:10000/default", "org.apache.hadoop.hive.jdbc.HiveDriver"),
        ];
        for (url, class_name) in cases {
            let driver = manager.driver_for_url(url).expect(url);
            assert_eq!(driver.class_name, class_name, "url {url}");
        }
    }

    #[test]
    fn test_derby_client_wins_over_embedded() {
        let manager = DriverManager::with_known_drivers();
        assert_eq!(
            manager.driver_for_url("jdbc:derby://localhost:1527/projects").unwrap().class_name,
            "org.apache.derby.jdbc.ClientDriver"
        );
        assert_eq!(
            manager.driver_for_url("jdbc:derby:memory:projects;create=true").unwrap().class_name,
            "org.apache.derby.jdbc.AutoloadedDriver"
        );
    }

    #[test]
    fn test_no_driver_for_unknown_url() {
        let manager = DriverManager::with_known_drivers();
        assert!(manager.driver_for_url("jdbc:nosuchdb://host/x").is_none());
        assert!(manager.driver_for_url("postgres://host/x").is_none());
    }

    #[test]
    fn test_register_replaces_same_class() {
        let mut manager = DriverManager::new();
        manager.register(JdbcDriver::new("com.example.Driver", &["jdbc:a:"]));
        manager.register(JdbcDriver::new("com.other.Driver", &["jdbc:b:"]));
        manager.register(JdbcDriver::new("com.example.Driver", &["jdbc:c:"]));

        assert_eq!(manager.list(), vec!["com.example.Driver", "com.other.Driver"]);
        assert!(manager.driver_for_url("jdbc:a:x").is_none());
        assert!(manager.driver_for_url("jdbc:c:x").is_some());
    }

    #[test]
    fn test_known_default_port() {
        assert_eq!(known_default_port("jdbc:postgresql://db/app"), Some(5432));
        assert_eq!(known_default_port("jdbc:derby:memory:x"), None);
        assert_eq!(known_default_port("jdbc:unknown://x"), None);
    }
}
