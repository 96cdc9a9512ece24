use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::DeckError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A port published from a container to the host, in the engine's `-p host:container` form.
///
/// ## Format
/// - `host:container` publishes a container port on a different host port (e.g. "5001:5000")
/// - `port` or `port:port` publishes the same port number on both sides (e.g. "5000")
///
/// ## Examples
///
/// ```
/// use deck::config::PortPair;
///
/// // Host 5001 forwards to container 5000, e.g. after a conflict on 5000
/// let moved = PortPair::with_distinct(5001, 5000);
/// assert_eq!("5001:5000".parse::<PortPair>().unwrap(), moved);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPair {
    /// The host port and the container port are distinct.
    Distinct {
        /// The host port.
        host: u16,

        /// The container port.
        container: u16,
    },

    /// The host port and the container port are the same.
    Same(u16),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PortPair {
    /// Creates a new `PortPair` with the same container and host port.
    pub fn with_same(port: u16) -> Self {
        Self::Same(port)
    }

    /// Creates a new `PortPair` with distinct host and container ports.
    ///
    /// Collapses to [`PortPair::Same`] when both are equal.
    pub fn with_distinct(host: u16, container: u16) -> Self {
        if host == container {
            Self::Same(host)
        } else {
            Self::Distinct { host, container }
        }
    }

    /// Returns the host port.
    pub fn get_host(&self) -> u16 {
        match self {
            Self::Distinct { host, .. } | Self::Same(host) => *host,
        }
    }

    /// Returns the container port.
    pub fn get_container(&self) -> u16 {
        match self {
            Self::Distinct { container, .. } | Self::Same(container) => *container,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for PortPair {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |value: &str| {
            value
                .parse::<u16>()
                .ok()
                .filter(|port| *port > 0)
                .ok_or_else(|| DeckError::InvalidPortPair(s.to_string()))
        };

        match s.split_once(':') {
            Some((host, container)) => Ok(Self::with_distinct(parse(host)?, parse(container)?)),
            None => Ok(Self::Same(parse(s)?)),
        }
    }
}

impl fmt::Display for PortPair {
    /// Formats the port pair following the format "host:container".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Distinct { host, container } => write!(f, "{}:{}", host, container),
            Self::Same(port) => write!(f, "{}:{}", port, port),
        }
    }
}

impl Serialize for PortPair {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PortPair {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_pair_from_str() {
        assert_eq!("5000".parse::<PortPair>().unwrap(), PortPair::Same(5000));
        assert_eq!("5000:5000".parse::<PortPair>().unwrap(), PortPair::Same(5000));
        assert_eq!(
            "5001:5000".parse::<PortPair>().unwrap(),
            PortPair::Distinct {
                host: 5001,
                container: 5000
            }
        );

        assert!("".parse::<PortPair>().is_err());
        assert!(":80".parse::<PortPair>().is_err());
        assert!("80:".parse::<PortPair>().is_err());
        assert!("0".parse::<PortPair>().is_err());
        assert!("70000".parse::<PortPair>().is_err());
        assert!("web:80".parse::<PortPair>().is_err());
    }

    #[test]
    fn test_port_pair_display() {
        assert_eq!(PortPair::Same(8080).to_string(), "8080:8080");
        assert_eq!(PortPair::with_distinct(8081, 8080).to_string(), "8081:8080");
    }

    #[test]
    fn test_port_pair_getters() {
        let moved = PortPair::with_distinct(9230, 9229);
        assert_eq!(moved.get_host(), 9230);
        assert_eq!(moved.get_container(), 9229);
        assert_eq!(PortPair::with_distinct(5037, 5037), PortPair::Same(5037));
    }
}
