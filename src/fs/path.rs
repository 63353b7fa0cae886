use std::path::PathBuf;

/// Converts the `/`-separated absolute paths the browser sends into native
/// filesystem paths.
pub trait ClientPath {
    fn to_native(&self) -> PathBuf;
}

impl ClientPath for str {
    fn to_native(&self) -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            PathBuf::from(self.strip_prefix('/').unwrap_or(self))
        }

        #[cfg(not(target_os = "windows"))]
        {
            if self.starts_with('/') {
                PathBuf::from(self)
            } else {
                PathBuf::from(format!("/{self}"))
            }
        }
    }
}

impl ClientPath for String {
    fn to_native(&self) -> PathBuf {
        self.as_str().to_native()
    }
}

impl ClientPath for PathBuf {
    fn to_native(&self) -> PathBuf {
        self.to_string_lossy().to_native()
    }
}

impl ClientPath for std::borrow::Cow<'_, str> {
    fn to_native(&self) -> PathBuf {
        self.as_ref().to_native()
    }
}

#[cfg(test)]
#[cfg(not(target_os = "windows"))]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_is_unchanged() {
        assert_eq!("/home/user".to_native(), PathBuf::from("/home/user"));
    }

    #[test]
    fn relative_path_gains_leading_slash() {
        assert_eq!("home/user".to_native(), PathBuf::from("/home/user"));
    }
}
