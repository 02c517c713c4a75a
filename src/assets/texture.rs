use crate::assets::{read_with_progress, AssetError, LoadHandle, TextureSource};
use crate::scene::material::OverlayImage;

/// Decodes overlay images (PNG / JPEG) to RGBA8 on a loader thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageLoader;

impl TextureSource for ImageLoader {
    fn load_texture(&self, uri: &str) -> LoadHandle<OverlayImage> {
        let owned_uri = uri.to_string();
        LoadHandle::spawn(uri, move |completer| {
            let bytes = read_with_progress(&owned_uri, completer)?;
            decode_overlay(&owned_uri, &bytes)
        })
    }
}

pub fn decode_overlay(uri: &str, bytes: &[u8]) -> Result<OverlayImage, AssetError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(OverlayImage::new(uri, decoded.to_rgba8()))
}
