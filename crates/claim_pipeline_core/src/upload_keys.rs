pub const DEFAULT_UPLOAD_FOLDER: &str = "claimcollectors11";

pub fn upload_object_key(folder: &str, filename: &str) -> String {
    let trimmed = folder.trim_matches('/');
    let filename = filename.trim_start_matches('/');
    if trimmed.is_empty() {
        filename.to_string()
    } else {
        format!("{trimmed}/{filename}")
    }
}

/// An empty prefix accepts every key.
pub fn is_under_prefix(key: &str, prefix: &str) -> bool {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        return true;
    }
    key.strip_prefix(trimmed)
        .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_filename_with_upload_folder() {
        assert_eq!(
            upload_object_key(DEFAULT_UPLOAD_FOLDER, "report.pdf"),
            "claimcollectors11/report.pdf"
        );
        assert_eq!(
            upload_object_key("/uploads/", "/nested/report.pdf"),
            "uploads/nested/report.pdf"
        );
        assert_eq!(upload_object_key("", "report.pdf"), "report.pdf");
    }

    #[test]
    fn prefix_match_requires_folder_boundary() {
        assert!(is_under_prefix("claimcollectors11/report.pdf", "claimcollectors11/"));
        assert!(is_under_prefix("claimcollectors11/a/b.pdf", "claimcollectors11"));
        assert!(!is_under_prefix("claimcollectors110/report.pdf", "claimcollectors11"));
        assert!(!is_under_prefix(
            "static-website001gomspeed/index.html",
            "claimcollectors11"
        ));
        assert!(is_under_prefix("anything.pdf", ""));
    }
}
