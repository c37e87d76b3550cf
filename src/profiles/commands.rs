// region:    --- Imports
use crate::error::{ServiceError, ServiceResult};
use crate::geocoding::Geocoder;
use crate::profiles::model::{NewProfile, Profile, ProfilePatch, ResolvedAddress};
use crate::store::ProfileStore;
use chrono::Utc;
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Profile Commands

/// 프로필 조회
pub async fn get_profile(store: &dyn ProfileStore, user_id: &str) -> ServiceResult<Profile> {
    info!("{:<12} --> 프로필 조회 user: {}", "Profile", user_id);
    store
        .find_profile(user_id)
        .await?
        .ok_or_else(profile_not_found)
}

/// 프로필 생성. 이미 있으면 기존 프로필은 그대로 두고 Conflict.
pub async fn create_profile(
    store: &dyn ProfileStore,
    user_id: &str,
    request: NewProfile,
) -> ServiceResult<Profile> {
    let postcode = request
        .postcode
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    let profile = Profile::new(user_id, postcode, Utc::now());

    match store.insert_if_absent(profile).await? {
        Some(created) => {
            info!("{:<12} --> 프로필 생성 user: {}", "Profile", user_id);
            Ok(created)
        }
        None => {
            warn!("{:<12} --> 이미 존재하는 프로필 user: {}", "Profile", user_id);
            Err(ServiceError::Conflict("User already exists".to_string()))
        }
    }
}

/// 프로필 부분 수정
pub async fn update_profile(
    store: &dyn ProfileStore,
    user_id: &str,
    patch: ProfilePatch,
) -> ServiceResult<Profile> {
    let update = patch.into_update()?;
    let profile = store
        .update_profile(user_id, &update)
        .await?
        .ok_or_else(profile_not_found)?;
    info!("{:<12} --> 프로필 수정 user: {}", "Profile", user_id);
    Ok(profile)
}

/// 우편번호 -> 좌표/주소. 외부 호출 실패는 결과 없음으로 처리한다.
pub async fn resolve_address(geocoder: &dyn Geocoder, postcode: &str) -> Option<ResolvedAddress> {
    let postcode = postcode.trim();
    if postcode.is_empty() {
        return None;
    }
    match geocoder.resolve(postcode).await {
        Ok(found) => {
            info!(
                "{:<12} --> 주소 검색 postcode: {}, 결과: {}",
                "Profile",
                postcode,
                found.is_some()
            );
            found
        }
        Err(e) => {
            warn!(
                "{:<12} --> 주소 검색 실패 postcode: {}, error: {}",
                "Profile", postcode, e
            );
            None
        }
    }
}

// endregion: --- Profile Commands

fn profile_not_found() -> ServiceError {
    ServiceError::NotFound("User not found".to_string())
}
