//! Location data model: the immutable catalogue entry looked up by
//! [`crate::location::index::LocationIndex`].

use unicode_normalization::UnicodeNormalization;

/// A named geographic point, loaded once at startup and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: String,
    pub normalized_name: String,
    pub prefecture: Option<String>,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    /// Build a `Location`, filling in `normalized_name`/`prefecture`/`region`
    /// when the caller leaves them unset, mirroring the catalogue loader's
    /// best-effort inference for rows that don't carry this metadata.
    pub fn new(
        name: impl Into<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Self {
        let name = name.into();
        let normalized_name = normalize_name(&name);
        let prefecture = infer_prefecture(&name).map(str::to_string);
        let region = prefecture
            .as_deref()
            .and_then(infer_region)
            .map(str::to_string);
        Self {
            name,
            normalized_name,
            prefecture,
            region,
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another location, in kilometers.
    /// `None` if either location lacks coordinates.
    pub fn distance_to(&self, other: &Location) -> Option<f64> {
        let (lat1, lon1) = (self.latitude?, self.longitude?);
        let (lat2, lon2) = (other.latitude?, other.longitude?);
        Some(haversine_km(lat1, lon1, lat2, lon2))
    }
}

const EARTH_RADIUS_KM: f64 = 6371.0;

fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// NFKC-normalize and lowercase a location name for stable lookup.
pub fn normalize_name(name: &str) -> String {
    name.nfkc().collect::<String>().trim().to_lowercase()
}

/// Edit (Levenshtein) distance between two strings, operating on chars.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// The maximum edit distance tolerated for a query of the given length,
/// per the fuzzy-lookup contract: `max(1, len(query)/3)`.
pub fn fuzzy_tolerance(query_len: usize) -> usize {
    (query_len / 3).max(1)
}

// Prefecture/region inference tables, ported from the original catalogue
// loader's hardcoded lookup (a supplement: fills optional fields the
// contract leaves room for, never overrides an explicit value).
const PREFECTURES: &[(&str, &[&str])] = &[
    ("北海道", &["札幌", "函館", "旭川", "釧路", "帯広", "北見", "岩見沢", "網走", "留萌", "稚内"]),
    ("青森", &["青森", "八戸", "弘前", "むつ"]),
    ("岩手", &["盛岡", "一関", "奥州", "花巻"]),
    ("宮城", &["仙台", "石巻", "名取", "多賀城"]),
    ("秋田", &["秋田", "横手", "大仙", "由利本荘"]),
    ("山形", &["山形", "鶴岡", "酒田", "米沢"]),
    ("福島", &["福島", "郡山", "いわき", "会津若松"]),
    ("茨城", &["水戸", "つくば", "土浦", "日立", "ひたちなか"]),
    ("栃木", &["宇都宮", "小山", "足利", "栃木", "佐野", "大田原"]),
    ("群馬", &["前橋", "高崎", "伊勢崎", "太田", "桐生", "渋川", "みなかみ"]),
    ("埼玉", &["さいたま", "川越", "熊谷", "川口", "所沢", "春日部", "秩父"]),
    ("千葉", &["千葉", "船橋", "市川", "松戸", "柏", "市原", "銚子", "館山"]),
    ("東京", &["東京", "新宿", "渋谷", "品川", "世田谷", "練馬", "八王子", "父島", "大島", "八丈島"]),
    ("神奈川", &["横浜", "川崎", "相模原", "横須賀", "藤沢", "小田原"]),
    ("新潟", &["新潟", "長岡", "上越", "三条", "燕"]),
    ("富山", &["富山", "高岡", "射水", "魚津"]),
    ("石川", &["金沢", "小松", "白山", "加賀"]),
    ("福井", &["福井", "敦賀", "小浜", "坂井"]),
    ("山梨", &["甲府", "富士吉田", "笛吹", "南アルプス", "河口湖"]),
    ("長野", &["長野", "松本", "上田", "飯田", "諏訪"]),
    ("岐阜", &["岐阜", "大垣", "各務原", "多治見", "高山"]),
    ("静岡", &["静岡", "浜松", "沼津", "熱海", "富士", "清水", "網代"]),
    ("愛知", &["名古屋", "豊橋", "一宮", "豊田", "岡崎"]),
    ("三重", &["津", "四日市", "伊勢", "松阪", "鈴鹿", "尾鷲"]),
    ("滋賀", &["大津", "草津", "長浜", "東近江", "彦根"]),
    ("京都", &["京都", "宇治", "亀岡", "舞鶴", "福知山"]),
    ("大阪", &["大阪", "堺", "枚方", "東大阪", "豊中"]),
    ("兵庫", &["神戸", "姫路", "西宮", "尼崎", "明石", "豊岡"]),
    ("奈良", &["奈良", "橿原", "生駒", "大和郡山", "風屋"]),
    ("和歌山", &["和歌山", "田辺", "新宮", "海南", "潮岬", "日和佐"]),
    ("鳥取", &["鳥取", "米子", "倉吉", "境港"]),
    ("島根", &["松江", "出雲", "浜田", "益田"]),
    ("岡山", &["岡山", "倉敷", "津山", "総社"]),
    ("広島", &["広島", "福山", "呉", "尾道"]),
    ("山口", &["山口", "下関", "宇部", "周南"]),
    ("徳島", &["徳島", "鳴門", "阿南", "吉野川"]),
    ("香川", &["高松", "丸亀", "坂出", "観音寺"]),
    ("愛媛", &["松山", "今治", "新居浜", "西条", "宇和島"]),
    ("高知", &["高知", "南国", "四万十", "室戸岬"]),
    ("福岡", &["福岡", "北九州", "久留米", "飯塚"]),
    ("佐賀", &["佐賀", "唐津", "鳥栖", "伊万里"]),
    ("長崎", &["長崎", "佐世保", "諫早", "大村"]),
    ("熊本", &["熊本", "八代", "天草", "荒尾"]),
    ("大分", &["大分", "別府", "中津", "日田"]),
    ("宮崎", &["宮崎", "都城", "延岡", "日向"]),
    ("鹿児島", &["鹿児島", "霧島", "鹿屋", "指宿"]),
    ("沖縄", &["那覇", "沖縄", "うるま", "浦添", "宜野湾", "名護", "石垣島", "宮古島", "久米島", "与那国島", "大東島"]),
];

const REGIONS: &[(&str, &[&str])] = &[
    ("北海道・東北", &["北海道", "青森", "岩手", "宮城", "秋田", "山形", "福島"]),
    ("関東", &["茨城", "栃木", "群馬", "埼玉", "千葉", "東京", "神奈川"]),
    ("中部", &["新潟", "富山", "石川", "福井", "山梨", "長野", "岐阜", "静岡", "愛知"]),
    ("近畿", &["三重", "滋賀", "京都", "大阪", "兵庫", "奈良", "和歌山"]),
    ("中国", &["鳥取", "島根", "岡山", "広島", "山口"]),
    ("四国", &["徳島", "香川", "愛媛", "高知"]),
    ("九州", &["福岡", "佐賀", "長崎", "熊本", "大分", "宮崎", "鹿児島"]),
    ("沖縄", &["沖縄"]),
];

/// Infer a prefecture from a location name, by direct prefecture-name match
/// first and then by known city name.
pub fn infer_prefecture(name: &str) -> Option<&'static str> {
    for (pref, _) in PREFECTURES {
        if name.contains(pref) {
            return Some(pref);
        }
    }
    for (pref, cities) in PREFECTURES {
        if cities.iter().any(|city| name.contains(city)) {
            return Some(pref);
        }
    }
    None
}

/// Infer a region from an already-known prefecture.
pub fn infer_region(prefecture: &str) -> Option<&'static str> {
    REGIONS
        .iter()
        .find(|(_, prefs)| prefs.contains(&prefecture))
        .map(|(region, _)| *region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_fullwidth_and_case() {
        assert_eq!(normalize_name("Ｔｏｋｙｏ "), "tokyo");
    }

    #[test]
    fn levenshtein_identical_is_zero() {
        assert_eq!(levenshtein_distance("tokyo", "tokyo"), 0);
    }

    #[test]
    fn levenshtein_single_substitution() {
        assert_eq!(levenshtein_distance("osaka", "osakq"), 1);
    }

    #[test]
    fn levenshtein_empty_strings() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
    }

    #[test]
    fn fuzzy_tolerance_rounds_down_with_floor_one() {
        assert_eq!(fuzzy_tolerance(1), 1);
        assert_eq!(fuzzy_tolerance(2), 1);
        assert_eq!(fuzzy_tolerance(3), 1);
        assert_eq!(fuzzy_tolerance(6), 2);
        assert_eq!(fuzzy_tolerance(9), 3);
    }

    #[test]
    fn infer_prefecture_from_city_name() {
        assert_eq!(infer_prefecture("札幌"), Some("北海道"));
        assert_eq!(infer_prefecture("横浜"), Some("神奈川"));
        assert_eq!(infer_prefecture("謎の地名"), None);
    }

    #[test]
    fn infer_region_from_prefecture() {
        assert_eq!(infer_region("東京"), Some("関東"));
        assert_eq!(infer_region("沖縄"), Some("沖縄"));
    }

    #[test]
    fn distance_to_requires_both_coordinates() {
        let tokyo = Location::new("東京", Some(35.6895), Some(139.6917));
        let osaka = Location::new("大阪", Some(34.6937), Some(135.5023));
        let unknown = Location::new("謎の地名", None, None);

        let d = tokyo.distance_to(&osaka).unwrap();
        assert!((400.0..420.0).contains(&d), "distance was {d}");
        assert_eq!(tokyo.distance_to(&unknown), None);
    }

    #[test]
    fn new_fills_in_prefecture_and_region() {
        let loc = Location::new("札幌", Some(43.06), Some(141.35));
        assert_eq!(loc.prefecture.as_deref(), Some("北海道"));
        assert_eq!(loc.region.as_deref(), Some("北海道・東北"));
    }
}
