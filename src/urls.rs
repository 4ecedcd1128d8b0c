use url::Url;

use crate::store::Collection;

/// Convenience wrapper for image URL generation. Images live in the blob
/// store under `<base>/<collection>/<id>/<file>`.
#[derive(Clone, Debug)]
pub struct Urls {
    /// Base URL of the blob store.
    base: Url,
}

impl Urls {
    /// Create a new instance. Panics if `base` is not an absolute
    /// hierarchical URL.
    pub fn new(base: impl AsRef<str>) -> Self {
        let base =
            Url::parse(base.as_ref()).unwrap_or_else(|_| panic!("parse {} as URL", base.as_ref()));

        if base.cannot_be_a_base() {
            panic!("{} cannot be used as a base URL", base);
        }

        Urls { base }
    }

    pub fn profile_image(&self, uid: &str) -> Url {
        self.image(Collection::Users, uid, "profile.jpeg")
    }

    pub fn meeting_image(&self, id: &str) -> Url {
        self.image(Collection::Posts, id, "photo.jpeg")
    }

    fn image(&self, collection: Collection, id: &str, file: &str) -> Url {
        let mut url = self.base.clone();

        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(&[collection.name(), id, file]);
        }

        url
    }
}
