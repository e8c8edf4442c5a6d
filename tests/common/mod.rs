//! Shared fixtures: a small curriculum and a deterministic keyword embedder

#![allow(dead_code)]

use musicqna::embedding::{l2_normalize, Embedder};
use musicqna::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// One axis per keyword; a text's vector marks which keywords it mentions
pub const KEYWORDS: &[&str] = &["도미넌트", "토닉", "세컨더리", "케이던스", "스케일"];

pub struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dimension(&self) -> usize {
        KEYWORDS.len()
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector: Vec<f32> = KEYWORDS
                    .iter()
                    .map(|k| if text.contains(k) { 1.0 } else { 0.0 })
                    .collect();
                l2_normalize(&mut vector);
                vector
            })
            .collect())
    }
}

/// Curriculum where the exact "세컨더리 도미넌트" record is not the closest vector
pub const CURRICULUM_JSON: &str = r#"[
  {
    "node_id": 1,
    "parent_id": null,
    "concept.ko": "도미넌트",
    "concept.en": "Dominant",
    "aliases": "딸림화음; V",
    "definition": "음계의 다섯 번째 음 위의 화음",
    "logic": "으뜸화음으로 해결하려는 긴장",
    "examples.name": "G - C",
    "examples.description": null,
    "tips": "",
    "prerequisites.ko": "음정",
    "prerequisites.en": "interval"
  },
  {
    "node_id": 2,
    "parent_id": 1,
    "concept.ko": "세컨더리 도미넌트",
    "concept.en": "Secondary Dominant",
    "aliases": ["V/V", "부속화음"],
    "definition": "조성 내 다른 화음을 임시 으뜸음으로 삼는 딸림화음",
    "logic": "일시적인 토닉 지향",
    "examples.name": "D7 - G",
    "examples.description": "C장조에서 V의 V",
    "tips": "반음 상승 이끎음을 찾으세요"
  },
  {
    "node_id": 3,
    "parent_id": 1,
    "concept.ko": "도미넌트 세븐스 코드",
    "concept.en": "Dominant Seventh Chord",
    "aliases": "V7",
    "definition": "세컨더리 도미넌트로도 자주 쓰이는 4화음"
  },
  {
    "node_id": 4,
    "parent_id": null,
    "concept.ko": "토닉",
    "concept.en": "Tonic",
    "aliases": "으뜸화음; I",
    "definition": "조성의 중심 화음"
  },
  {
    "node_id": 5,
    "concept.ko": "케이던스",
    "concept.en": "Cadence",
    "aliases": "종지",
    "definition": "악구를 마무리하는 화음 진행"
  }
]"#;

/// Write the fixture curriculum into `dir` and return its path
pub fn write_curriculum(dir: &Path) -> PathBuf {
    let path = dir.join("curriculum.json");
    fs::write(&path, CURRICULUM_JSON).unwrap();
    path
}
