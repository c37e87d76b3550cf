/// 상품 조회 컬럼 (location은 경도/위도로 분리)
macro_rules! item_columns {
    () => {
        "id, provider_id, collector_id, title, description, category, availability, expiry, \
         ST_X(location::geometry) AS lng, ST_Y(location::geometry) AS lat, \
         postcode, address, photo, created_at"
    };
}

/// 프로필 조회 컬럼
macro_rules! profile_columns {
    () => {
        "user_id, display_name, profile_picture, postcode, address, \
         ST_X(location::geometry) AS lng, ST_Y(location::geometry) AS lat, \
         preferred_distance_unit, preferred_distance, created_at"
    };
}

/// 상품 저장
pub const INSERT_ITEM: &str = concat!(
    "INSERT INTO items (id, provider_id, collector_id, title, description, category, availability, expiry, location, postcode, address, photo, created_at)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, ST_SetSRID(ST_MakePoint($9, $10), 4326)::geography, $11, $12, $13, $14)
     RETURNING ",
    item_columns!()
);

/// 상품 조회
pub const GET_ITEM: &str = concat!("SELECT ", item_columns!(), " FROM items WHERE id = $1");

/// 상품 목록 조회 (조건은 동적으로 추가)
pub const SELECT_ITEMS: &str = concat!("SELECT ", item_columns!(), " FROM items WHERE TRUE");

/// 상품 수정 반환 컬럼
pub const RETURNING_ITEM: &str = concat!(" RETURNING ", item_columns!());

/// 상품 삭제
pub const DELETE_ITEM: &str = "DELETE FROM items WHERE id = $1";

/// 상품 일괄 삭제 (조건은 동적으로 추가)
pub const DELETE_ITEMS: &str = "DELETE FROM items WHERE TRUE";

/// 근거리 질의 시작. 이어서 기준점 경도, 위도를 바인딩한다.
pub const PROXIMITY_ORIGIN: &str =
    "WITH origin AS (SELECT ST_SetSRID(ST_MakePoint(";

/// 근거리 후보 집합. 이어서 최대 거리(m)를 바인딩하고 조건을 덧붙인다.
pub const PROXIMITY_MATCHES: &str = concat!(
    "), 4326)::geography AS point),
     matches AS (
        SELECT ",
    item_columns!(),
    ", ST_Distance(items.location, origin.point) AS distance
        FROM items, origin
        WHERE items.location IS NOT NULL
          AND ST_DWithin(items.location, origin.point, "
);

/// 전체 건수와 페이지를 한 번에 반환. 페이지가 비어도 건수 행은 남는다.
pub const PROXIMITY_PAGE_HEAD: &str = "),
     total AS (SELECT COUNT(*) AS total_count FROM matches)
     SELECT total.total_count, page.*
     FROM total
     LEFT JOIN LATERAL (SELECT * FROM matches ORDER BY ";

/// 프로필 저장 (이미 있으면 아무것도 하지 않음)
pub const INSERT_PROFILE: &str = concat!(
    "INSERT INTO profiles (user_id, display_name, profile_picture, postcode, address, location, preferred_distance_unit, preferred_distance, created_at)
     VALUES ($1, $2, $3, $4, $5, ST_SetSRID(ST_MakePoint($6, $7), 4326)::geography, $8, $9, $10)
     ON CONFLICT (user_id) DO NOTHING
     RETURNING ",
    profile_columns!()
);

/// 프로필 조회
pub const GET_PROFILE: &str = concat!(
    "SELECT ",
    profile_columns!(),
    " FROM profiles WHERE user_id = $1"
);

/// 프로필 수정 반환 컬럼
pub const RETURNING_PROFILE: &str = concat!(" RETURNING ", profile_columns!());
