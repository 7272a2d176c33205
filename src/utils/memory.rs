pub fn parse_memory_to_bytes(mem: &str) -> Option<u64> {
    let mem = mem.trim().to_uppercase();
    let num_part: String = mem.chars().take_while(|c| c.is_ascii_digit()).collect();
    let val = num_part.parse::<u64>().ok()?;
    let unit = mem[num_part.len()..].trim_end_matches('B');

    let scale: u64 = match unit {
        "G" => 1024 * 1024 * 1024,
        "M" => 1024 * 1024,
        "K" => 1024,
        "" => 1,
        _ => return None,
    };
    val.checked_mul(scale)
}

/// Heap ceiling in MB from the last `-Xmx` flag of a JVM argument line.
pub fn max_heap_mb(jvm_arguments: &str) -> Option<f64> {
    jvm_arguments
        .split_whitespace()
        .filter_map(|arg| arg.strip_prefix("-Xmx"))
        .filter_map(parse_memory_to_bytes)
        .last()
        .map(|bytes| bytes as f64 / 1024.0 / 1024.0)
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
