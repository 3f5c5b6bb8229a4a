use crate::utils::geometry::BoundingBox;

const UPLOAD_SEGMENT: &str = "/image/upload/";

/// Variant of a Cloudinary delivery URL with the longest edge capped.
/// Used when the original bytes exceed the recognition service input limit.
pub fn resized_url(original_url: &str, max_dim: u32) -> String {
    original_url.replace(
        UPLOAD_SEGMENT,
        &format!("{}w_{},c_limit/", UPLOAD_SEGMENT, max_dim),
    )
}

/// Face thumbnail URL: square crop centered on the box, padded by 30% of the
/// longest side beyond its extent, then filled to `thumb_size` square webp.
/// Always derived from the original (not resized) photo URL so the crop
/// coordinates line up with the stored pixel dimensions.
pub fn face_thumbnail_url(
    photo_url: &str,
    bbox: &BoundingBox,
    img_width: u32,
    img_height: u32,
    thumb_size: u32,
) -> String {
    let pad = 0.3;
    let iw = img_width as f64;
    let ih = img_height as f64;
    let cx = (bbox.x + bbox.w / 2.0) * iw;
    let cy = (bbox.y + bbox.h / 2.0) * ih;
    let side = (bbox.w * iw).max(bbox.h * ih) * (1.0 + pad * 2.0);

    let crop_x = (cx - side / 2.0).round().max(0.0) as i64;
    let crop_y = (cy - side / 2.0).round().max(0.0) as i64;
    let crop_side = side.round() as i64;

    photo_url.replace(
        UPLOAD_SEGMENT,
        &format!(
            "{}c_crop,w_{},h_{},x_{},y_{}/c_fill,w_{},h_{}/f_webp,q_auto:low/",
            UPLOAD_SEGMENT, crop_side, crop_side, crop_x, crop_y, thumb_size, thumb_size
        ),
    )
}
