use sha2::{Digest, Sha256};

/// Hash an IP address for privacy and storage
pub fn hash_ip(ip: &str, salt: &str) -> String {
    // Salting keeps the hashes from being reversed with a lookup table
    let salted_ip = format!("{}{}", ip, salt);

    let mut hasher = Sha256::new();
    hasher.update(salted_ip.as_bytes());
    let result = hasher.finalize();

    format!("{:x}", result)
}
