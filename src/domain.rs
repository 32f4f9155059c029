/// Derives the domain of a visited link by plain string stripping.
///
/// Drops everything through the last `//` and the last `www.`, then cuts at
/// the first `/` and the first `?`. Case, ports and trailing dots are kept
/// as written, and malformed input still yields some substring.
pub fn extract_domain(link: &str) -> &str {
    let rest = link.rsplit_once("//").map_or(link, |(_, rest)| rest);
    let rest = rest.rsplit_once("www.").map_or(rest, |(_, rest)| rest);
    let rest = rest.split_once('/').map_or(rest, |(host, _)| host);
    rest.split_once('?').map_or(rest, |(host, _)| host)
}
