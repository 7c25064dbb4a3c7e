pub const NODE_KEY_PREFIX: &str = "node";
pub const PLACEMENT_KEY_PREFIX: &str = "placement";

pub fn node_key_for(region_id: &str, node_id: &str) -> String {
    format!("{}:{}:{}", NODE_KEY_PREFIX, region_id, node_id)
}

pub fn placement_key_for(bucket: &str, object: &str) -> String {
    format!("{}:{}:{}", PLACEMENT_KEY_PREFIX, bucket, object)
}
