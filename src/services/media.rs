use std::path::{Path, PathBuf};
use std::time::Duration;

use wpp::MediaRef;

use crate::config::settings::OfferSettings;
use crate::utils::{AppError, AppResult};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Baixa a imagem da oferta uma única vez e reaproveita o arquivo local
pub async fn ensure_local_image(
    http: &reqwest::Client,
    url: &str,
    dir: impl AsRef<Path>,
    name: &str,
) -> AppResult<PathBuf> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::MediaError(format!("Falha ao criar {}: {}", dir.display(), e)))?;

    let path = dir.join(name);
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        tracing::debug!("🖼️ Imagem da oferta já em cache: {}", path.display());
        return Ok(path);
    }

    tracing::info!("⬇️ Baixando imagem da oferta: {}", url);

    let response = http.get(url).timeout(DOWNLOAD_TIMEOUT).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::MediaError(format!("Download retornou status {}", status)));
    }

    let bytes = response.bytes().await?;
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| AppError::MediaError(format!("Falha ao gravar {}: {}", path.display(), e)))?;

    tracing::info!("✅ Imagem da oferta salva em {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

/// Mídia que acompanha a mensagem
///
/// Sem `image_url` a oferta vai só em texto. Se o download falhar, a URL é
/// repassada ao gateway para ele mesmo baixar.
pub async fn prepare_offer_media(http: &reqwest::Client, offer: &OfferSettings) -> Option<MediaRef> {
    let url = offer.image_url.as_deref().filter(|u| !u.trim().is_empty())?;

    match ensure_local_image(http, url, &offer.media_dir, &offer.local_image_name).await {
        Ok(path) => Some(MediaRef::Path(path)),
        Err(e) => {
            tracing::warn!("⚠️ Imagem da oferta indisponível localmente ({}); usando URL", e);
            Some(MediaRef::Url(url.to_string()))
        }
    }
}
