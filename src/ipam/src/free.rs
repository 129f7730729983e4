use ipnet::IpNet;

use super::{
    cidr::{bits_to_addr, bounds, host_mask, overlaps},
    error::Error,
};

/// Finds the lowest addressed subnet of `prefix_len` inside `range`
/// that doesn't overlap any of `reserved`.
///
/// Candidates are aligned to their own size, so the result is always a
/// canonical network. Reserved networks may have any size and don't need
/// to be inside `range`; networks of the other address family are ignored.
/// For the same arguments the result is always the same.
pub fn find_free_subnet(range: &IpNet, prefix_len: u8, reserved: &[IpNet]) -> Result<IpNet, Error> {
    if prefix_len < range.prefix_len() || prefix_len > range.max_prefix_len() {
        return Err(Error::InvalidSubnetSize {
            range: *range,
            prefix_len,
        });
    }
    let exhausted = || Error::NoFreeSubnet {
        range: *range,
        prefix_len,
    };

    let (_, last) = bounds(range);
    let mask = host_mask(range.max_prefix_len() - prefix_len);

    let mut blocks: Vec<(u128, u128)> = reserved
        .iter()
        .filter(|r| overlaps(range, r))
        .map(bounds)
        .collect();
    blocks.sort_unstable();

    let mut candidate = bounds(range).0;
    loop {
        let candidate_last = candidate | mask;

        // Blocks are sorted by their first address, so every block that
        // can still overlap this candidate starts at or before candidate_last.
        let clash = blocks
            .iter()
            .take_while(|(first, _)| *first <= candidate_last)
            .filter(|(_, block_last)| *block_last >= candidate)
            .map(|(_, block_last)| *block_last)
            .max();

        match clash {
            None => {
                return IpNet::new(bits_to_addr(candidate, range), prefix_len)
                    .map_err(|_| exhausted());
            }
            Some(block_last) => {
                // Jump to the first aligned candidate after the clashing block.
                candidate = match block_last.checked_add(1) {
                    Some(next) => match next.checked_add(mask) {
                        Some(n) => n & !mask,
                        None => return Err(exhausted()),
                    },
                    None => return Err(exhausted()),
                };
                if candidate > last {
                    return Err(exhausted());
                }
            }
        }
    }
}
