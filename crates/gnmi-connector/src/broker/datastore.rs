//! Logical datastores and their gNMI data-type hints.

use std::fmt;
use std::str::FromStr;

use gnmi_proto::gnmi::DataType;
use serde::{Deserialize, Serialize};

use crate::error::BrokerError;

/// The two datastores a transaction can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalDatastore {
    Configuration,
    Operational,
}

impl LogicalDatastore {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalDatastore::Configuration => "configuration",
            LogicalDatastore::Operational => "operational",
        }
    }
}

impl fmt::Display for LogicalDatastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalDatastore {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" | "configuration" => Ok(LogicalDatastore::Configuration),
            "operational" | "state" => Ok(LogicalDatastore::Operational),
            other => Err(BrokerError::invalid_datastore("lookup", other)),
        }
    }
}

/// Maps each logical datastore to the `DataType` hint sent with Get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatastoreMapping {
    pub configuration: DataType,
    pub operational: DataType,
}

impl Default for DatastoreMapping {
    fn default() -> Self {
        Self {
            configuration: DataType::Config,
            operational: DataType::State,
        }
    }
}

impl DatastoreMapping {
    pub fn data_type(&self, store: LogicalDatastore) -> DataType {
        match store {
            LogicalDatastore::Configuration => self.configuration,
            LogicalDatastore::Operational => self.operational,
        }
    }

    /// Replaces the hint for one datastore.
    pub fn with_override(mut self, store: LogicalDatastore, data_type: DataType) -> Self {
        match store {
            LogicalDatastore::Configuration => self.configuration = data_type,
            LogicalDatastore::Operational => self.operational = data_type,
        }
        self
    }
}

/// Parses a `DataType` name as written in configuration files.
pub fn parse_data_type(name: &str) -> Option<DataType> {
    match name.to_ascii_lowercase().as_str() {
        "all" => Some(DataType::All),
        "config" => Some(DataType::Config),
        "state" => Some(DataType::State),
        "operational" => Some(DataType::Operational),
        _ => None,
    }
}
