use sky_format::Skylink;
use sky_primitives::{RequestBudget, SkyError};
use tokio_util::sync::CancellationToken;

use crate::error::DownloadResult;

/// Bounds how many v2 (registry-link) hops `resolve_to_file_skylink` will
/// follow before giving up; a chain longer than this is almost certainly a
/// misconfigured or malicious pointer loop.
const MAX_REGISTRY_REDIRECTS: usize = 2;

/// Resolves a registry skylink to the v1 (or further v2) skylink it points
/// at. Implemented by the registry crate; kept as a trait here so the
/// download engine doesn't depend on the registry wire format.
#[async_trait::async_trait]
pub trait RegistryLinkResolver: Send + Sync {
    async fn resolve(
        &self,
        registry_skylink: Skylink,
        budget: &RequestBudget,
        cancel: &CancellationToken,
    ) -> DownloadResult<Skylink>;
}

/// Follows `skylink` through up to [`MAX_REGISTRY_REDIRECTS`] registry hops,
/// returning the first non-registry (file) skylink reached.
pub async fn resolve_to_file_skylink(
    resolver: Option<&dyn RegistryLinkResolver>,
    mut skylink: Skylink,
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> DownloadResult<Skylink> {
    let mut hops = 0usize;
    while skylink.is_registry_link() {
        if hops >= MAX_REGISTRY_REDIRECTS {
            return Err(SkyError::InvalidSkylink {
                context: "resolve_to_file_skylink",
            });
        }
        let resolver = resolver.ok_or(SkyError::InvalidSkylink {
            context: "resolve_to_file_skylink",
        })?;
        skylink = resolver.resolve(skylink, budget, cancel).await?;
        hops += 1;
    }
    Ok(skylink)
}

#[cfg(test)]
mod tests {
    use sky_primitives::Hash;

    use super::*;

    struct OneHop(Skylink);

    #[async_trait::async_trait]
    impl RegistryLinkResolver for OneHop {
        async fn resolve(
            &self,
            _registry_skylink: Skylink,
            _budget: &RequestBudget,
            _cancel: &CancellationToken,
        ) -> DownloadResult<Skylink> {
            Ok(self.0)
        }
    }

    struct LoopsForever;

    #[async_trait::async_trait]
    impl RegistryLinkResolver for LoopsForever {
        async fn resolve(
            &self,
            registry_skylink: Skylink,
            _budget: &RequestBudget,
            _cancel: &CancellationToken,
        ) -> DownloadResult<Skylink> {
            Ok(registry_skylink)
        }
    }

    #[tokio::test]
    async fn non_registry_skylink_resolves_to_itself() {
        let link = Skylink::whole_sector(1, Hash::new([1u8; 32])).unwrap();
        let resolved = resolve_to_file_skylink(None, link, &RequestBudget::unbounded(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolved, link);
    }

    #[tokio::test]
    async fn one_hop_resolves_through_the_resolver() {
        let target = Skylink::whole_sector(1, Hash::new([2u8; 32])).unwrap();
        let registry_link = Skylink::whole_sector(2, Hash::new([9u8; 32])).unwrap();
        let resolver = OneHop(target);

        let resolved = resolve_to_file_skylink(
            Some(&resolver),
            registry_link,
            &RequestBudget::unbounded(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(resolved, target);
    }

    #[tokio::test]
    async fn a_pointer_loop_past_the_redirect_limit_is_rejected() {
        let registry_link = Skylink::whole_sector(2, Hash::new([9u8; 32])).unwrap();
        let resolver = LoopsForever;

        let err = resolve_to_file_skylink(
            Some(&resolver),
            registry_link,
            &RequestBudget::unbounded(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SkyError::InvalidSkylink { .. }));
    }

    #[tokio::test]
    async fn registry_link_without_a_resolver_is_rejected() {
        let registry_link = Skylink::whole_sector(2, Hash::new([9u8; 32])).unwrap();
        let err = resolve_to_file_skylink(None, registry_link, &RequestBudget::unbounded(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SkyError::InvalidSkylink { .. }));
    }
}
