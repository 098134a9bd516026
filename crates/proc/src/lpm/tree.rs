//! 이진 프리픽스 트리 — IPv4/IPv6 최장 프리픽스 매칭
//!
//! 주소 비트를 MSB부터 한 비트씩 따라 내려가는 단순 이진 트라이입니다.
//! 깊이 *d*의 노드는 길이 *d*의 프리픽스를 나타내며, 값이 있는 노드만
//! 매칭 후보가 됩니다. IPv4와 IPv6는 루트를 따로 둡니다.
//!
//! 트리는 적재 후 변경하지 않습니다. 재적재는 항상 새 트리를 만들어 통째로 교체합니다.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::ProcError;

/// 마스킹된 네트워크 프리픽스 (`주소/길이`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix {
    addr: IpAddr,
    len: u8,
}

impl Prefix {
    /// 프리픽스를 생성합니다. 호스트 비트는 0으로 마스킹됩니다.
    pub fn new(addr: IpAddr, len: u8) -> Result<Self, ProcError> {
        let max = max_len(&addr);
        if len > max {
            return Err(ProcError::InvalidPrefix {
                input: format!("{addr}/{len}"),
                reason: format!("length must be at most {max}"),
            });
        }
        let masked = from_bits(&addr, to_bits(&addr) & mask(len, max));
        Ok(Self { addr: masked, len })
    }

    /// 단일 호스트 프리픽스 (`/32` 또는 `/128`)
    pub fn host(addr: IpAddr) -> Self {
        let len = max_len(&addr);
        Self { addr, len }
    }

    /// 네트워크 주소
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// 프리픽스 길이
    pub fn len(&self) -> u8 {
        self.len
    }

    /// 길이 0 (기본 경로) 여부
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn bit(&self, depth: u8) -> usize {
        let width = u32::from(max_len(&self.addr));
        ((to_bits(&self.addr) >> (width - 1 - u32::from(depth))) & 1) as usize
    }
}

impl FromStr for Prefix {
    type Err = ProcError;

    /// `주소/길이` 또는 길이 없는 단일 주소를 파싱합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ProcError::InvalidPrefix {
            input: s.to_owned(),
            reason,
        };

        match s.split_once('/') {
            Some((addr, len)) => {
                let addr: IpAddr = addr.parse().map_err(|e| invalid(format!("{e}")))?;
                let len: u8 = len
                    .parse()
                    .map_err(|e| invalid(format!("bad prefix length: {e}")))?;
                Self::new(addr, len)
            }
            None => {
                let addr: IpAddr = s.parse().map_err(|e| invalid(format!("{e}")))?;
                Ok(Self::host(addr))
            }
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

fn max_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn to_bits(addr: &IpAddr) -> u128 {
    match addr {
        IpAddr::V4(a) => u128::from(u32::from(*a)),
        IpAddr::V6(a) => u128::from(*a),
    }
}

fn from_bits(like: &IpAddr, bits: u128) -> IpAddr {
    match like {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::from(bits as u32)),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::from(bits)),
    }
}

fn mask(len: u8, width: u8) -> u128 {
    if len == 0 {
        return 0;
    }
    let ones = u128::MAX << (128 - u32::from(len));
    ones >> (128 - u32::from(width))
}

struct Node<T> {
    entry: Option<(Prefix, T)>,
    children: [Option<Box<Node<T>>>; 2],
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            entry: None,
            children: [None, None],
        }
    }
}

/// 최장 프리픽스 매칭 트리
pub struct PrefixTree<T> {
    v4: Node<T>,
    v6: Node<T>,
    len: usize,
}

impl<T> Default for PrefixTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PrefixTree<T> {
    /// 빈 트리를 생성합니다.
    pub fn new() -> Self {
        Self {
            v4: Node::new(),
            v6: Node::new(),
            len: 0,
        }
    }

    /// 저장된 프리픽스 수
    pub fn len(&self) -> usize {
        self.len
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn root(&self, prefix: &Prefix) -> &Node<T> {
        match prefix.addr {
            IpAddr::V4(_) => &self.v4,
            IpAddr::V6(_) => &self.v6,
        }
    }

    /// 프리픽스를 삽입합니다.
    ///
    /// 같은 프리픽스가 이미 있으면 기존 값을 유지하고 `false`를 반환합니다.
    pub fn insert(&mut self, prefix: Prefix, value: T) -> bool {
        let mut node = match prefix.addr {
            IpAddr::V4(_) => &mut self.v4,
            IpAddr::V6(_) => &mut self.v6,
        };
        for depth in 0..prefix.len {
            let bit = prefix.bit(depth);
            node = &mut **node.children[bit].get_or_insert_with(|| Box::new(Node::new()));
        }
        if node.entry.is_some() {
            return false;
        }
        node.entry = Some((prefix, value));
        self.len += 1;
        true
    }

    /// 질의를 완전히 포함하는 가장 긴 프리픽스를 찾습니다.
    ///
    /// 질의가 단일 주소이면 그 주소를 포함하는 최장 프리픽스,
    /// 네트워크이면 그 네트워크 전체를 덮는 최장 프리픽스가 결과입니다.
    pub fn longest_match(&self, query: &Prefix) -> Option<(&Prefix, &T)> {
        let mut node = self.root(query);
        let mut best = node.entry.as_ref();
        for depth in 0..query.len {
            match &node.children[query.bit(depth)] {
                Some(child) => {
                    node = &**child;
                    if node.entry.is_some() {
                        best = node.entry.as_ref();
                    }
                }
                None => break,
            }
        }
        best.map(|(p, v)| (p, v))
    }

    /// 주소 또는 CIDR 문자열로 최장 매칭을 찾습니다.
    pub fn find(&self, query: &str) -> Result<Option<&T>, ProcError> {
        let query: Prefix = query.trim().parse()?;
        Ok(self.longest_match(&query).map(|(_, v)| v))
    }

    /// 정확히 같은 프리픽스의 값을 조회합니다.
    pub fn get(&self, prefix: &Prefix) -> Option<&T> {
        let mut node = self.root(prefix);
        for depth in 0..prefix.len {
            node = node.children[prefix.bit(depth)].as_deref()?;
        }
        node.entry.as_ref().map(|(_, v)| v)
    }
}

impl<T> fmt::Debug for PrefixTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixTree").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    #[test]
    fn prefix_masks_host_bits() {
        assert_eq!(p("10.1.2.3/8").to_string(), "10.0.0.0/8");
        assert_eq!(p("2001:db8::1/32").to_string(), "2001:db8::/32");
        assert_eq!(p("0.0.0.0/0").to_string(), "0.0.0.0/0");
        assert_eq!(p("10.1.2.3").len(), 32);
    }

    #[test]
    fn prefix_rejects_bad_input() {
        assert!("10.0.0.0/33".parse::<Prefix>().is_err());
        assert!("10.0.0/8".parse::<Prefix>().is_err());
        assert!("10.0.0.0/x".parse::<Prefix>().is_err());
        assert!("not-an-ip".parse::<Prefix>().is_err());
    }

    #[test]
    fn longest_prefix_wins() {
        let mut tree = PrefixTree::new();
        assert!(tree.insert(p("10.0.0.0/8"), "outer"));
        assert!(tree.insert(p("10.1.0.0/16"), "inner"));

        assert_eq!(tree.find("10.1.2.3").unwrap(), Some(&"inner"));
        assert_eq!(tree.find("10.2.0.1").unwrap(), Some(&"outer"));
        assert_eq!(tree.find("11.0.0.1").unwrap(), None);
    }

    #[test]
    fn default_route_matches_everything() {
        let mut tree = PrefixTree::new();
        tree.insert(p("0.0.0.0/0"), "default");
        tree.insert(p("192.168.0.0/16"), "lan");
        assert_eq!(tree.find("8.8.8.8").unwrap(), Some(&"default"));
        assert_eq!(tree.find("192.168.1.1").unwrap(), Some(&"lan"));
        // IPv6 루트는 분리되어 있습니다.
        assert_eq!(tree.find("::1").unwrap(), None);
    }

    #[test]
    fn cidr_query_needs_covering_prefix() {
        let mut tree = PrefixTree::new();
        tree.insert(p("10.0.0.0/8"), "outer");
        tree.insert(p("10.1.0.0/16"), "inner");

        assert_eq!(tree.find("10.1.0.0/24").unwrap(), Some(&"inner"));
        // /12는 10.1.0.0/16보다 넓으므로 /8만 전체를 덮습니다.
        assert_eq!(tree.find("10.0.0.0/12").unwrap(), Some(&"outer"));
    }

    #[test]
    fn duplicate_insert_keeps_first() {
        let mut tree = PrefixTree::new();
        assert!(tree.insert(p("10.0.0.0/8"), 1));
        assert!(!tree.insert(p("10.9.9.9/8"), 2));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&p("10.0.0.0/8")), Some(&1));
    }

    #[test]
    fn ipv6_lookup() {
        let mut tree = PrefixTree::new();
        tree.insert(p("2001:db8::/32"), "doc");
        tree.insert(p("2001:db8:1::/48"), "doc-1");
        assert_eq!(tree.find("2001:db8:1::42").unwrap(), Some(&"doc-1"));
        assert_eq!(tree.find("2001:db8:2::42").unwrap(), Some(&"doc"));
        assert_eq!(tree.find("10.0.0.1").unwrap(), None);
    }

    #[test]
    fn longest_match_returns_stored_prefix() {
        let mut tree = PrefixTree::new();
        tree.insert(p("172.16.0.0/12"), ());
        let (prefix, _) = tree.longest_match(&p("172.20.1.1")).unwrap();
        assert_eq!(prefix.to_string(), "172.16.0.0/12");
    }

    #[test]
    fn invalid_query_is_error() {
        let tree: PrefixTree<()> = PrefixTree::new();
        assert!(tree.find("300.1.1.1").is_err());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn longest_match_picks_most_specific_covering_prefix(
            entries in proptest::collection::vec((any::<u32>(), 0u8..=32), 1..64),
            probe in any::<u32>(),
        ) {
            let mut tree = PrefixTree::new();
            let mut stored = Vec::new();
            for (bits, len) in entries {
                let prefix = Prefix::new(IpAddr::V4(Ipv4Addr::from(bits)), len).unwrap();
                if tree.insert(prefix, len) {
                    stored.push(prefix);
                }
            }

            let host = Prefix::host(IpAddr::V4(Ipv4Addr::from(probe)));
            let covering = stored
                .iter()
                .filter(|p| {
                    let mask = u32::MAX.checked_shl(32 - u32::from(p.len())).unwrap_or(0);
                    let IpAddr::V4(net) = p.addr() else { unreachable!() };
                    probe & mask == u32::from(net)
                })
                .map(|p| p.len())
                .max();

            let found = tree.longest_match(&host).map(|(p, _)| p.len());
            prop_assert_eq!(found, covering);
        }
    }
}
