//! Language labels and the state picker list.

use serde::Serialize;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Language {
    pub code: &'static str,
    pub label: &'static str,
    /// Tesseract traineddata name used for OCR.
    #[serde(skip)]
    pub ocr_pack: &'static str,
}

pub const DEFAULT_LANGUAGE: &str = "en";

pub const LANGUAGES: &[Language] = &[
    Language { code: "en", label: "English", ocr_pack: "eng" },
    Language { code: "hi", label: "Hindi", ocr_pack: "hin" },
    Language { code: "bn", label: "Bengali", ocr_pack: "ben" },
    Language { code: "te", label: "Telugu", ocr_pack: "tel" },
    Language { code: "mr", label: "Marathi", ocr_pack: "mar" },
    Language { code: "ta", label: "Tamil", ocr_pack: "tam" },
    Language { code: "gu", label: "Gujarati", ocr_pack: "guj" },
    Language { code: "kn", label: "Kannada", ocr_pack: "kan" },
    Language { code: "ml", label: "Malayalam", ocr_pack: "mal" },
    Language { code: "pa", label: "Punjabi", ocr_pack: "pan" },
    Language { code: "or", label: "Odia", ocr_pack: "ori" },
    Language { code: "ur", label: "Urdu", ocr_pack: "urd" },
];

pub const STATES: &[&str] = &[
    "Andhra Pradesh",
    "Arunachal Pradesh",
    "Assam",
    "Bihar",
    "Chhattisgarh",
    "Goa",
    "Gujarat",
    "Haryana",
    "Himachal Pradesh",
    "Jharkhand",
    "Karnataka",
    "Kerala",
    "Madhya Pradesh",
    "Maharashtra",
    "Manipur",
    "Meghalaya",
    "Mizoram",
    "Nagaland",
    "Odisha",
    "Punjab",
    "Rajasthan",
    "Sikkim",
    "Tamil Nadu",
    "Telangana",
    "Tripura",
    "Uttar Pradesh",
    "Uttarakhand",
    "West Bengal",
    "Andaman and Nicobar Islands",
    "Chandigarh",
    "Dadra and Nagar Haveli and Daman and Diu",
    "Delhi",
    "Jammu and Kashmir",
    "Ladakh",
    "Lakshadweep",
    "Puducherry",
];

/// Looks a language up by code, case-insensitively.
pub fn find(code: &str) -> Option<&'static Language> {
    let code = code.trim();
    LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

/// Label for a language code; unknown codes fall back to English.
pub fn label_for(code: &str) -> &'static str {
    find(code).map(|l| l.label).unwrap_or("English")
}

/// OCR packs to load: the document language plus English, since most
/// government forms mix the two.
pub fn ocr_packs_for(code: &str) -> String {
    match find(code) {
        Some(lang) if lang.ocr_pack != "eng" => format!("{}+eng", lang.ocr_pack),
        _ => "eng".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_labels() {
        assert_eq!(label_for("hi"), "Hindi");
        assert_eq!(label_for(" TA "), "Tamil");
        assert_eq!(label_for("xx"), "English");
    }

    #[test]
    fn ocr_packs_include_english() {
        assert_eq!(ocr_packs_for("en"), "eng");
        assert_eq!(ocr_packs_for("bn"), "ben+eng");
        assert_eq!(ocr_packs_for("zz"), "eng");
    }

    #[test]
    fn default_language_is_supported() {
        assert!(find(DEFAULT_LANGUAGE).is_some());
        assert_eq!(STATES.len(), 36);
    }
}
