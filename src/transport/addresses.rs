//! Ordering of server addresses advertised to clients.

/// Preference of an IPv4 address by its first octet. Private ranges first,
/// link-local and loopback last.
pub fn precedence(address: &str) -> i32 {
    let network = address.split('.').next().unwrap_or("");
    match network {
        "10" => 2,
        "192" => 1,
        "169" => -1,
        "172" => -2,
        "127" => -9,
        _ => 0,
    }
}

/// Sort by descending precedence. Ties keep their discovery order.
pub fn order_by_precedence(addresses: &[String]) -> Vec<String> {
    let mut ordered = addresses.to_vec();
    ordered.sort_by_key(|address| -precedence(address));
    ordered
}
