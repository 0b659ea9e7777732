use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpAllowListError {
    #[error("invalid IP address or CIDR range: {0}")]
    InvalidEntry(String),

    #[error("invalid prefix length in {0}")]
    InvalidPrefix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IpRule {
    Exact(IpAddr),
    Cidr { network: IpAddr, prefix: u8 },
}

impl IpRule {
    fn matches(&self, ip: IpAddr) -> bool {
        match *self {
            IpRule::Exact(allowed) => allowed == ip,
            IpRule::Cidr { network: IpAddr::V4(net), prefix } => match ip {
                IpAddr::V4(addr) => {
                    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
                    u32::from(net) & mask == u32::from(addr) & mask
                }
                IpAddr::V6(_) => false,
            },
            IpRule::Cidr { network: IpAddr::V6(net), prefix } => match ip {
                IpAddr::V6(addr) => {
                    let mask = if prefix == 0 { 0 } else { u128::MAX << (128 - prefix) };
                    u128::from(net) & mask == u128::from(addr) & mask
                }
                IpAddr::V4(_) => false,
            },
        }
    }
}

/// REST访问的IP白名单
///
/// 条目为精确地址或CIDR（IPv4/IPv6）。空名单允许所有客户端。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpAllowList {
    rules: Vec<IpRule>,
}

impl IpAllowList {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn parse<I, S>(entries: I) -> Result<Self, IpAllowListError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            rules.push(parse_rule(entry)?);
        }
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn allows(&self, ip: IpAddr) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        let ip = canonical(ip);
        self.rules.iter().any(|rule| rule.matches(ip))
    }
}

fn parse_rule(entry: &str) -> Result<IpRule, IpAllowListError> {
    match entry.split_once('/') {
        Some((addr, prefix)) => {
            let network: IpAddr = addr
                .trim()
                .parse()
                .map_err(|_| IpAllowListError::InvalidEntry(entry.to_string()))?;
            let prefix: u8 = prefix
                .trim()
                .parse()
                .map_err(|_| IpAllowListError::InvalidPrefix(entry.to_string()))?;
            let max = if network.is_ipv4() { 32 } else { 128 };
            if prefix > max {
                return Err(IpAllowListError::InvalidPrefix(entry.to_string()));
            }
            // 客户端地址会被规范成IPv4，映射网段也要换算成IPv4网段
            match network {
                IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                    Some(_) if prefix < 96 => Err(IpAllowListError::InvalidPrefix(entry.to_string())),
                    Some(v4) => Ok(IpRule::Cidr {
                        network: IpAddr::V4(v4),
                        prefix: prefix - 96,
                    }),
                    None => Ok(IpRule::Cidr { network, prefix }),
                },
                IpAddr::V4(_) => Ok(IpRule::Cidr { network, prefix }),
            }
        }
        None => entry
            .parse()
            .map(|ip| IpRule::Exact(canonical(ip)))
            .map_err(|_| IpAllowListError::InvalidEntry(entry.to_string())),
    }
}

/// IPv4映射的IPv6地址按IPv4比较
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        IpAddr::V4(_) => ip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_list_allows_all() {
        let list = IpAllowList::parse(Vec::<String>::new()).unwrap();
        assert!(list.is_empty());
        assert!(list.allows(ip("203.0.113.9")));
        assert!(list.allows(ip("::1")));
    }

    #[test]
    fn test_exact_and_cidr_v4() {
        let list = IpAllowList::parse(["127.0.0.1", "10.0.0.0/8", " "]).unwrap();
        assert!(list.allows(ip("127.0.0.1")));
        assert!(list.allows(ip("10.200.3.4")));
        assert!(!list.allows(ip("11.0.0.1")));
        assert!(!list.allows(ip("127.0.0.2")));
    }

    #[test]
    fn test_cidr_v6_and_mapped_v4() {
        let list = IpAllowList::parse(["2001:db8::/32", "192.168.1.0/24"]).unwrap();
        assert!(list.allows(ip("2001:db8:1::5")));
        assert!(!list.allows(ip("2001:db9::1")));
        assert!(list.allows(ip("::ffff:192.168.1.20")));
    }

    #[test]
    fn test_mapped_v4_cidr_matches_v4_clients() {
        let list = IpAllowList::parse(["::ffff:10.0.0.0/104"]).unwrap();
        assert!(list.allows(ip("10.1.2.3")));
        assert!(list.allows(ip("::ffff:10.1.2.3")));
        assert!(!list.allows(ip("11.0.0.1")));
        assert_eq!(
            IpAllowList::parse(["::ffff:10.0.0.0/80"]),
            Err(IpAllowListError::InvalidPrefix("::ffff:10.0.0.0/80".to_string()))
        );
    }

    #[test]
    fn test_zero_prefix_matches_family() {
        let list = IpAllowList::parse(["0.0.0.0/0"]).unwrap();
        assert!(list.allows(ip("8.8.8.8")));
        assert!(!list.allows(ip("2001:db8::1")));
    }

    #[test]
    fn test_invalid_entries() {
        assert_eq!(
            IpAllowList::parse(["not-an-ip"]),
            Err(IpAllowListError::InvalidEntry("not-an-ip".to_string()))
        );
        assert_eq!(
            IpAllowList::parse(["10.0.0.0/33"]),
            Err(IpAllowListError::InvalidPrefix("10.0.0.0/33".to_string()))
        );
    }
}
