use anyhow::Result;
use serde::Serialize;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::render_json;
    use crate::errors::PipelineWarning;

    #[test]
    fn warnings_are_tagged_by_kind() {
        let out = render_json(&[PipelineWarning::DegenerateIntersection {
            common_dates: 0,
            common_pincodes: 4,
        }])
        .expect("json");
        assert!(out.contains("\"kind\": \"degenerate_intersection\""));
        assert!(out.contains("\"common_pincodes\": 4"));
    }
}
