//! Local-name translation layer
//!
//! Maps canonical ingredient keys (and brand tokens) to the local-market
//! ingredient names used by the domestic registry. The built-in table can be
//! extended with a JSON overlay; the dictionary is read-only once loaded.

use crate::error::{Error, Result};
use crate::normalizer::{build_ingredient_base, normalize_product_name, split_components};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BUILTIN_INGREDIENTS: &[(&str, &str)] = &[
    ("ACETAMINOPHEN", "아세트아미노펜"),
    ("ACETAMINOPHEN; CAFFEINE", "아세트아미노펜; 카페인"),
    ("AMLODIPINE", "암로디핀"),
    ("AMOXICILLIN", "아목시실린"),
    ("AMOXICILLIN; CLAVULANATE", "아목시실린; 클라불란산"),
    ("ARIPIPRAZOLE", "아리피프라졸"),
    ("ASPIRIN", "아스피린"),
    ("ATORVASTATIN", "아토르바스타틴"),
    ("AZITHROMYCIN", "아지트로마이신"),
    ("BISOPROLOL", "비소프롤롤"),
    ("CAFFEINE", "카페인"),
    ("CANDESARTAN", "칸데사르탄"),
    ("CARVEDILOL", "카르베딜롤"),
    ("CELECOXIB", "세레콕시브"),
    ("CETIRIZINE", "세티리진"),
    ("CIPROFLOXACIN", "시프로플록사신"),
    ("CLARITHROMYCIN", "클래리트로마이신"),
    ("CLAVULANATE", "클라불란산"),
    ("CLOPIDOGREL", "클로피도그렐"),
    ("DICLOFENAC", "디클로페낙"),
    ("DONEPEZIL", "도네페질"),
    ("ESCITALOPRAM", "에스시탈로프람"),
    ("ESOMEPRAZOLE", "에스오메프라졸"),
    ("FINASTERIDE", "피나스테리드"),
    ("FLUOXETINE", "플루옥세틴"),
    ("FUROSEMIDE", "푸로세미드"),
    ("GABAPENTIN", "가바펜틴"),
    ("GLIMEPIRIDE", "글리메피리드"),
    ("HYDROCHLOROTHIAZIDE", "히드로클로로티아지드"),
    ("HYDROCHLOROTHIAZIDE; LOSARTAN", "로사르탄; 히드로클로로티아지드"),
    ("IBUPROFEN", "이부프로펜"),
    ("LANSOPRAZOLE", "란소프라졸"),
    ("LEVOFLOXACIN", "레보플록사신"),
    ("LEVOTHYROXINE", "레보티록신"),
    ("LISINOPRIL", "리시노프릴"),
    ("LORATADINE", "로라타딘"),
    ("LOSARTAN", "로사르탄"),
    ("METFORMIN", "메트포르민"),
    ("METOPROLOL", "메토프롤롤"),
    ("MONTELUKAST", "몬테루카스트"),
    ("NAPROXEN", "나프록센"),
    ("OLANZAPINE", "올란자핀"),
    ("OLMESARTAN MEDOXOMIL", "올메사르탄메독소밀"),
    ("OMEPRAZOLE", "오메프라졸"),
    ("PANTOPRAZOLE", "판토프라졸"),
    ("PAROXETINE", "파록세틴"),
    ("PRAVASTATIN", "프라바스타틴"),
    ("PREDNISOLONE", "프레드니솔론"),
    ("PREGABALIN", "프레가발린"),
    ("QUETIAPINE", "쿠에티아핀"),
    ("RABEPRAZOLE", "라베프라졸"),
    ("ROSUVASTATIN", "로수바스타틴"),
    ("SERTRALINE", "서트랄린"),
    ("SILDENAFIL", "실데나필"),
    ("SIMVASTATIN", "심바스타틴"),
    ("SITAGLIPTIN", "시타글립틴"),
    ("SPIRONOLACTONE", "스피로노락톤"),
    ("TADALAFIL", "타다라필"),
    ("TAMSULOSIN", "탐스로신"),
    ("TELMISARTAN", "텔미사르탄"),
    ("TRAMADOL", "트라마돌"),
    ("VALSARTAN", "발사르탄"),
    ("WARFARIN", "와파린"),
];

const BUILTIN_BRANDS: &[(&str, &str)] = &[
    ("ADVIL", "이부프로펜"),
    ("AUGMENTIN", "아목시실린; 클라불란산"),
    ("CIALIS", "타다라필"),
    ("COZAAR", "로사르탄"),
    ("CRESTOR", "로수바스타틴"),
    ("DIOVAN", "발사르탄"),
    ("GLUCOPHAGE", "메트포르민"),
    ("LASIX", "푸로세미드"),
    ("LIPITOR", "아토르바스타틴"),
    ("LOPRESSOR", "메토프롤롤"),
    ("NEXIUM", "에스오메프라졸"),
    ("NORVASC", "암로디핀"),
    ("PLAVIX", "클로피도그렐"),
    ("PRILOSEC", "오메프라졸"),
    ("PROZAC", "플루옥세틴"),
    ("SYNTHROID", "레보티록신"),
    ("TYLENOL", "아세트아미노펜"),
    ("VIAGRA", "실데나필"),
    ("ZESTRIL", "리시노프릴"),
    ("ZOCOR", "심바스타틴"),
    ("ZOLOFT", "서트랄린"),
];

/// JSON overlay file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictionaryOverlay {
    /// Ingredient text → local name (keys are canonicalized on load)
    #[serde(default)]
    pub ingredients: HashMap<String, String>,
    /// Brand token → local name
    #[serde(default)]
    pub brands: HashMap<String, String>,
}

/// Translation outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translation {
    pub local_name: String,
    /// True only when the ingredient base itself was found in the dictionary
    pub mapped: bool,
}

/// Canonical ingredient → local-name dictionary
#[derive(Debug, Clone, Default)]
pub struct LocalNameDictionary {
    ingredients: HashMap<String, String>,
    brands: HashMap<String, String>,
}

impl LocalNameDictionary {
    /// Built-in table
    pub fn builtin() -> Self {
        let ingredients = BUILTIN_INGREDIENTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let brands = BUILTIN_BRANDS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { ingredients, brands }
    }

    /// Built-in table plus a JSON overlay string
    pub fn from_json(json: &str) -> Result<Self> {
        let overlay: DictionaryOverlay = serde_json::from_str(json)?;
        if overlay.ingredients.is_empty() && overlay.brands.is_empty() {
            return Err(Error::Config("dictionary overlay has no entries".into()));
        }
        let mut dictionary = Self::builtin();
        dictionary.merge(overlay);
        Ok(dictionary)
    }

    /// Built-in table plus a JSON overlay file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Merge an overlay; overlay entries win over built-in ones.
    pub fn merge(&mut self, overlay: DictionaryOverlay) {
        for (key, value) in overlay.ingredients {
            let key = build_ingredient_base(&key);
            let value = value.trim().to_string();
            if !key.is_empty() && !value.is_empty() {
                self.ingredients.insert(key, value);
            }
        }
        for (key, value) in overlay.brands {
            let key = normalize_product_name(&key);
            let value = value.trim().to_string();
            if !key.is_empty() && !value.is_empty() {
                self.brands.insert(key, value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ingredients.len() + self.brands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a canonical ingredient base.
    ///
    /// Multi-component bases missing as a whole are mapped component by
    /// component; every component must map.
    pub fn lookup_base(&self, ingredient_base: &str) -> Option<String> {
        let key = ingredient_base.trim();
        if key.is_empty() {
            return None;
        }
        if let Some(name) = self.ingredients.get(key) {
            return Some(name.clone());
        }

        let components = split_components(key);
        if components.len() < 2 {
            return None;
        }
        components
            .iter()
            .map(|c| self.ingredients.get(c.as_str()).cloned())
            .collect::<Option<Vec<_>>>()
            .map(|names| names.join("; "))
    }

    /// Look up a raw token (brand first, then ingredient).
    pub fn lookup_token(&self, token: &str) -> Option<String> {
        let key = token.trim().to_uppercase();
        if key.is_empty() {
            return None;
        }
        self.brands
            .get(&key)
            .or_else(|| self.ingredients.get(&key))
            .cloned()
    }

    /// Translate an ingredient base, falling back to raw tokens in order.
    pub fn translate(&self, ingredient_base: &str, fallback_tokens: &[&str]) -> Translation {
        if let Some(local_name) = self.lookup_base(ingredient_base) {
            return Translation {
                local_name,
                mapped: true,
            };
        }

        fallback_tokens
            .iter()
            .find_map(|token| self.lookup_token(token))
            .map(|local_name| Translation {
                local_name,
                mapped: false,
            })
            .unwrap_or_default()
    }
}
