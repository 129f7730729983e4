use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

use super::error::Error;

// Both families are handled as u128 so the arithmetic below is shared.
pub(crate) fn addr_to_bits(addr: &IpAddr) -> u128 {
    match addr {
        IpAddr::V4(a) => u32::from(*a) as u128,
        IpAddr::V6(a) => u128::from(*a),
    }
}

pub(crate) fn bits_to_addr(bits: u128, family: &IpNet) -> IpAddr {
    match family {
        IpNet::V4(_) => IpAddr::V4(Ipv4Addr::from(bits as u32)),
        IpNet::V6(_) => IpAddr::V6(Ipv6Addr::from(bits)),
    }
}

// Mask with the lowest `host_bits` bits set.
pub(crate) fn host_mask(host_bits: u8) -> u128 {
    if host_bits >= 128 {
        u128::MAX
    } else {
        (1u128 << host_bits) - 1
    }
}

/// First and last address of the network as bits.
pub(crate) fn bounds(network: &IpNet) -> (u128, u128) {
    let first = addr_to_bits(&network.network());
    let host_bits = network.max_prefix_len() - network.prefix_len();
    (first, first | host_mask(host_bits))
}

fn same_family(a: &IpNet, b: &IpNet) -> bool {
    matches!((a, b), (IpNet::V4(_), IpNet::V4(_)) | (IpNet::V6(_), IpNet::V6(_)))
}

/// Host bits of a canonical network are all zero.
pub fn is_canonical(network: &IpNet) -> bool {
    network.addr() == network.network()
}

/// Returns the network one prefix bit shorter that contains `network`.
/// A /0 has no parent and is returned as is.
pub fn calculate_parent(network: &IpNet) -> IpNet {
    let prefix_len = network.prefix_len();
    if prefix_len == 0 {
        return *network;
    }
    let parent_len = prefix_len - 1;
    let host_bits = network.max_prefix_len() - parent_len;
    let base = addr_to_bits(&network.addr()) & !host_mask(host_bits);

    // parent_len is always valid for the family here.
    IpNet::new(bits_to_addr(base, network), parent_len).unwrap_or(*network)
}

pub fn filter<F>(networks: &[IpNet], predicate: F) -> Vec<IpNet>
where
    F: Fn(&IpNet) -> bool,
{
    networks.iter().filter(|n| predicate(*n)).cloned().collect()
}

pub fn contains(outer: &IpNet, inner: &IpNet) -> bool {
    if !same_family(outer, inner) {
        return false;
    }
    let (o_first, o_last) = bounds(outer);
    let (i_first, i_last) = bounds(inner);
    o_first <= i_first && i_last <= o_last
}

pub fn overlaps(a: &IpNet, b: &IpNet) -> bool {
    if !same_family(a, b) {
        return false;
    }
    let (a_first, a_last) = bounds(a);
    let (b_first, b_last) = bounds(b);
    a_first <= b_last && b_first <= a_last
}

/// Splits `network` into `count` equally sized subnets ordered by address.
/// `count` must be a power of two.
pub fn split(network: &IpNet, count: usize) -> Result<Vec<IpNet>, Error> {
    let invalid = || Error::InvalidSplit {
        network: *network,
        count,
    };
    if count == 0 || !count.is_power_of_two() {
        return Err(invalid());
    }
    let extra_bits = count.trailing_zeros() as u8;
    let prefix_len = network
        .prefix_len()
        .checked_add(extra_bits)
        .filter(|p| *p <= network.max_prefix_len())
        .ok_or_else(invalid)?;

    let (first, _) = bounds(network);
    let step_bits = network.max_prefix_len() - prefix_len;

    let mut subnets = Vec::with_capacity(count);
    for index in 0..count as u128 {
        let base = if step_bits >= 128 {
            first
        } else {
            first + (index << step_bits)
        };
        let subnet = IpNet::new(bits_to_addr(base, network), prefix_len).map_err(|_| invalid())?;
        subnets.push(subnet);
    }
    Ok(subnets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    fn net(s: &str) -> IpNet {
        IpNet::from_str(s).unwrap()
    }

    #[rstest(
        network,
        expected,
        case("192.168.3.0/24", "192.168.2.0/23"),
        case("10.100.3.96/27", "10.100.3.64/26"),
        case("0.0.0.0/0", "0.0.0.0/0"),
        case("255.255.255.255/32", "255.255.255.254/31"),
        case("10.0.0.0/8", "10.0.0.0/7"),
        case("10.0.0.1/32", "10.0.0.0/31"),
        case("128.0.0.0/1", "0.0.0.0/0"),
        case("2001:db8:0:3::/64", "2001:db8:0:2::/63"),
        case("::/0", "::/0"),
        case("2001:db8::ffff/128", "2001:db8::fffe/127"),
    )]
    fn works_calculate_parent(network: &str, expected: &str) {
        let parent = calculate_parent(&net(network));
        assert_eq!(parent, net(expected));
        assert!(is_canonical(&parent));
    }

    #[test]
    fn works_calculate_parent_matches_supernet() {
        for s in ["172.16.5.128/25", "10.100.0.0/16", "192.168.1.1/32"] {
            let n = net(s);
            assert_eq!(Some(calculate_parent(&n)), n.supernet());
        }
    }

    #[test]
    fn works_filter() {
        let networks = vec![
            net("10.0.0.0/24"),
            net("10.0.1.0/24"),
            net("10.0.2.0/24"),
            net("10.0.3.0/24"),
            net("10.0.4.0/24"),
        ];
        let excluded = net("10.0.2.0/24");

        let res = filter(&networks, |n| n.ne(&excluded));
        assert_eq!(
            res,
            vec![
                net("10.0.0.0/24"),
                net("10.0.1.0/24"),
                net("10.0.3.0/24"),
                net("10.0.4.0/24"),
            ]
        );

        assert!(filter(&networks, |_| false).is_empty());
        assert_eq!(filter(&networks, |_| true), networks);
        assert!(filter(&[], |_| true).is_empty());
    }

    #[rstest(
        a,
        b,
        expected,
        case("10.0.0.0/24", "10.0.0.0/24", true),
        case("10.0.0.0/16", "10.0.3.0/24", true),
        case("10.0.3.0/24", "10.0.0.0/16", true),
        case("10.0.0.0/24", "10.0.1.0/24", false),
        case("10.0.0.0/23", "10.0.1.128/25", true),
        case("10.0.0.0/8", "2001:db8::/32", false),
        case("0.0.0.0/0", "255.255.255.255/32", true),
    )]
    fn works_overlaps(a: &str, b: &str, expected: bool) {
        assert_eq!(overlaps(&net(a), &net(b)), expected);
        assert_eq!(overlaps(&net(b), &net(a)), expected);
    }

    #[rstest(
        outer,
        inner,
        expected,
        case("10.0.0.0/16", "10.0.3.0/24", true),
        case("10.0.3.0/24", "10.0.0.0/16", false),
        case("10.0.0.0/24", "10.0.0.0/24", true),
        case("10.0.0.0/24", "10.0.1.0/24", false),
        case("::/0", "10.0.0.0/8", false),
    )]
    fn works_contains(outer: &str, inner: &str, expected: bool) {
        assert_eq!(contains(&net(outer), &net(inner)), expected);
    }

    #[rstest(
        network,
        count,
        expected,
        case("10.100.2.0/24", 1, vec!["10.100.2.0/24"]),
        case("10.100.2.0/24", 2, vec!["10.100.2.0/25", "10.100.2.128/25"]),
        case("10.100.2.0/24", 4, vec!["10.100.2.0/26", "10.100.2.64/26", "10.100.2.128/26", "10.100.2.192/26"]),
        case("10.0.0.0/31", 2, vec!["10.0.0.0/32", "10.0.0.1/32"]),
        case("2001:db8::/48", 2, vec!["2001:db8::/49", "2001:db8:0:8000::/49"]),
    )]
    fn works_split(network: &str, count: usize, expected: Vec<&str>) {
        let res = split(&net(network), count).unwrap();
        let expected: Vec<IpNet> = expected.into_iter().map(net).collect();
        assert_eq!(res, expected);
    }

    #[rstest(
        network,
        count,
        case("10.100.2.0/24", 0),
        case("10.100.2.0/24", 3),
        case("10.0.0.0/31", 4),
        case("10.0.0.1/32", 2),
    )]
    fn fails_split(network: &str, count: usize) {
        match split(&net(network), count) {
            Ok(_) => panic!("this test should be failed"),
            Err(e) => assert!(matches!(e, Error::InvalidSplit { .. })),
        }
    }

    #[rstest(
        network,
        expected,
        case("10.0.0.0/24", true),
        case("10.0.0.1/24", false),
        case("2001:db8::/32", true),
        case("2001:db8::1/64", false),
    )]
    fn works_is_canonical(network: &str, expected: bool) {
        assert_eq!(is_canonical(&net(network)), expected);
    }
}
