use serde_json::{Value, json};

use crate::repository::memory::MemoryRepository;

/// Returns the path an uploader would use for the observation keyed `image_md5`.
pub fn observation_path(image_md5: &str) -> String {
    format!("data/{image_md5}.json")
}

/// Builds an observation with a few typical fields.
pub fn observation(image_md5: &str, species: &str) -> Value {
    json!({
        "image_md5": image_md5,
        "species": species,
        "latitude": 41.38,
        "longitude": 2.17,
        "author_email": "observer@example.com",
    })
}

/// Uploads `observation` at its conventional path.
pub async fn put_observation(repository: &MemoryRepository, observation: &Value) -> String {
    let key = observation
        .get("image_md5")
        .and_then(Value::as_str)
        .unwrap_or("unkeyed");
    let path = observation_path(key);
    repository
        .put_file(path.clone(), observation.to_string())
        .await;

    path
}

/// Uploads an observation file holding raw `content`.
pub async fn put_raw_observation(repository: &MemoryRepository, name: &str, content: &str) -> String {
    let path = format!("data/{name}.json");
    repository.put_file(path.clone(), content.to_string()).await;

    path
}
