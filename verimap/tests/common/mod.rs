use rand::Rng;

/// Generate `n` distinct key/value pairs with uniformly distributed digests.
pub fn fresh_entries(n: usize) -> (Vec<String>, Vec<String>) {
    let mut rng = rand::thread_rng();
    let mut keys = Vec::with_capacity(n);
    let mut values = Vec::with_capacity(n);
    for i in 0..n {
        keys.push(format!("key-{i}-{:016x}", rng.gen::<u64>()));
        values.push(format!("value-{:016x}", rng.gen::<u64>()));
    }
    (keys, values)
}
