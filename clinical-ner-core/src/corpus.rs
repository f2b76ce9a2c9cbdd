//! # Corpus Clínico Sintético
//!
//! Notas de prescrição curtas, escritas à mão, com entidades de medicação no
//! estilo das tarefas de extração de medicamentos:
//!
//! - **Drug**: nome do medicamento
//! - **Dosage**: dose (`40 mg`, `2 puffs`)
//! - **Route**: via de administração (`PO`, `IV`)
//! - **Frequency**: frequência (`twice daily`)
//! - **Duration**: duração (`for 7 days`)
//! - **Reason**: indicação (`hypertension`)
//!
//! Serve para o comando `demo` da CLI e para os testes de integração.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::annotation::{Annotations, EntityAnnotation};
use crate::dataset::Dataset;
use crate::error::{NerError, Result};

/// Uma nota anotada. As entidades são dadas como `(label, trecho)`, na ordem
/// em que aparecem no texto.
pub struct ClinicalNote {
    pub id: &'static str,
    pub text: &'static str,
    pub entities: &'static [(&'static str, &'static str)],
    /// Entradas `termo<TAB>tipo` do arquivo `.metamapped`, se houver
    pub metamap: &'static [(&'static str, &'static str)],
}

impl ClinicalNote {
    /// Localiza cada trecho no texto (a partir do fim do anterior) e produz as
    /// anotações com offsets em caracteres.
    pub fn annotations(&self) -> Result<Annotations> {
        let mut cursor = 0usize;
        let mut entities = Vec::with_capacity(self.entities.len());
        for (label, mention) in self.entities {
            let found = self.text[cursor..].find(mention).ok_or_else(|| {
                NerError::Annotation(format!("'{mention}' not found in note {}", self.id))
            })?;
            let start_byte = cursor + found;
            let end_byte = start_byte + mention.len();
            entities.push(EntityAnnotation {
                label: label.to_string(),
                start: self.text[..start_byte].chars().count(),
                end: self.text[..end_byte].chars().count(),
                text: mention.to_string(),
            });
            cursor = end_byte;
        }
        Ok(Annotations { entities })
    }
}

/// Retorna o corpus completo
pub fn clinical_notes() -> Vec<ClinicalNote> {
    vec![
        ClinicalNote {
            id: "note-01",
            text: "Patient admitted with chest pain. Started aspirin 81 mg PO daily and metoprolol 25 mg PO twice daily for hypertension.\n",
            entities: &[
                ("Reason", "chest pain"),
                ("Drug", "aspirin"),
                ("Dosage", "81 mg"),
                ("Route", "PO"),
                ("Frequency", "daily"),
                ("Drug", "metoprolol"),
                ("Dosage", "25 mg"),
                ("Route", "PO"),
                ("Frequency", "twice daily"),
                ("Reason", "hypertension"),
            ],
            metamap: &[("aspirin", "phsu"), ("metoprolol", "phsu"), ("chest pain", "sosy"), ("hypertension", "dsyn")],
        },
        ClinicalNote {
            id: "note-02",
            text: "Give furosemide 40 mg IV once for fluid overload. Continue lisinopril 10 mg PO daily.\n",
            entities: &[
                ("Drug", "furosemide"),
                ("Dosage", "40 mg"),
                ("Route", "IV"),
                ("Frequency", "once"),
                ("Reason", "fluid overload"),
                ("Drug", "lisinopril"),
                ("Dosage", "10 mg"),
                ("Route", "PO"),
                ("Frequency", "daily"),
            ],
            metamap: &[("furosemide", "phsu"), ("lisinopril", "phsu")],
        },
        ClinicalNote {
            id: "note-03",
            text: "Discharged on amoxicillin 500 mg PO three times daily for 10 days for pneumonia. Follow up in clinic next week.\n",
            entities: &[
                ("Drug", "amoxicillin"),
                ("Dosage", "500 mg"),
                ("Route", "PO"),
                ("Frequency", "three times daily"),
                ("Duration", "for 10 days"),
                ("Reason", "pneumonia"),
            ],
            metamap: &[("amoxicillin", "antb"), ("pneumonia", "dsyn")],
        },
        ClinicalNote {
            id: "note-04",
            text: "Heparin 5000 units subcutaneous every 8 hours for DVT prophylaxis. Patient tolerated the dose well.\n",
            entities: &[
                ("Drug", "Heparin"),
                ("Dosage", "5000 units"),
                ("Route", "subcutaneous"),
                ("Frequency", "every 8 hours"),
                ("Reason", "DVT prophylaxis"),
            ],
            metamap: &[],
        },
        ClinicalNote {
            id: "note-05",
            text: "Albuterol 2 puffs inhaled every 4 hours as needed for wheezing. No acute distress today.\n",
            entities: &[
                ("Drug", "Albuterol"),
                ("Dosage", "2 puffs"),
                ("Route", "inhaled"),
                ("Frequency", "every 4 hours as needed"),
                ("Reason", "wheezing"),
            ],
            metamap: &[("albuterol", "phsu"), ("wheezing", "sosy")],
        },
        ClinicalNote {
            id: "note-06",
            text: "Start metformin 500 mg PO twice daily for diabetes. Check glucose in the morning.\n",
            entities: &[
                ("Drug", "metformin"),
                ("Dosage", "500 mg"),
                ("Route", "PO"),
                ("Frequency", "twice daily"),
                ("Reason", "diabetes"),
            ],
            metamap: &[],
        },
        ClinicalNote {
            id: "note-07",
            text: "Ceftriaxone 1 g IV daily for 5 days for urinary tract infection. Blood cultures remain negative.\n",
            entities: &[
                ("Drug", "Ceftriaxone"),
                ("Dosage", "1 g"),
                ("Route", "IV"),
                ("Frequency", "daily"),
                ("Duration", "for 5 days"),
                ("Reason", "urinary tract infection"),
            ],
            metamap: &[("ceftriaxone", "antb")],
        },
        ClinicalNote {
            id: "note-08",
            text: "Morphine 2 mg IV every 2 hours as needed for pain. Continue ondansetron 4 mg IV every 6 hours for nausea.\n",
            entities: &[
                ("Drug", "Morphine"),
                ("Dosage", "2 mg"),
                ("Route", "IV"),
                ("Frequency", "every 2 hours as needed"),
                ("Reason", "pain"),
                ("Drug", "ondansetron"),
                ("Dosage", "4 mg"),
                ("Route", "IV"),
                ("Frequency", "every 6 hours"),
                ("Reason", "nausea"),
            ],
            metamap: &[],
        },
        ClinicalNote {
            id: "note-09",
            text: "Vital signs stable overnight. Resume warfarin 5 mg PO daily for atrial fibrillation.\n",
            entities: &[
                ("Drug", "warfarin"),
                ("Dosage", "5 mg"),
                ("Route", "PO"),
                ("Frequency", "daily"),
                ("Reason", "atrial fibrillation"),
            ],
            metamap: &[("warfarin", "phsu")],
        },
        ClinicalNote {
            id: "note-10",
            text: "Prednisone 40 mg PO daily for 7 days for asthma exacerbation. Patient educated about inhaler technique.\n",
            entities: &[
                ("Drug", "Prednisone"),
                ("Dosage", "40 mg"),
                ("Route", "PO"),
                ("Frequency", "daily"),
                ("Duration", "for 7 days"),
                ("Reason", "asthma exacerbation"),
            ],
            metamap: &[],
        },
        ClinicalNote {
            id: "note-11",
            text: "Give acetaminophen 650 mg PO every 6 hours for fever. Limit to 4 g per day.\n",
            entities: &[
                ("Drug", "acetaminophen"),
                ("Dosage", "650 mg"),
                ("Route", "PO"),
                ("Frequency", "every 6 hours"),
                ("Reason", "fever"),
                ("Dosage", "4 g"),
            ],
            metamap: &[("acetaminophen", "phsu"), ("fever", "sosy")],
        },
        ClinicalNote {
            id: "note-12",
            text: "Insulin glargine 10 units subcutaneous at bedtime for diabetes. Atorvastatin 40 mg daily was continued.\n",
            entities: &[
                ("Drug", "Insulin glargine"),
                ("Dosage", "10 units"),
                ("Route", "subcutaneous"),
                ("Frequency", "at bedtime"),
                ("Reason", "diabetes"),
                ("Drug", "Atorvastatin"),
                ("Dosage", "40 mg"),
                ("Frequency", "daily"),
            ],
            metamap: &[],
        },
    ]
}

/// Grava o corpus em `directory` como dataset (`.txt`, `.ann` e, quando há
/// léxico, `.metamapped`) e o abre.
pub fn write_demo_dataset(directory: &Path) -> Result<Dataset> {
    fs::create_dir_all(directory).map_err(|e| NerError::io(directory, e))?;
    let notes = clinical_notes();
    for note in &notes {
        let base = directory.join(note.id);

        let txt = base.with_extension("txt");
        fs::write(&txt, note.text).map_err(|e| NerError::io(&txt, e))?;

        let ann = base.with_extension("ann");
        note.annotations()?.write(&ann)?;

        if !note.metamap.is_empty() {
            let metamapped = base.with_extension("metamapped");
            let content: String = note
                .metamap
                .iter()
                .map(|(term, semantic_type)| format!("{term}\t{semantic_type}\n"))
                .collect();
            fs::write(&metamapped, content).map_err(|e| NerError::io(&metamapped, e))?;
        }
    }
    info!("Wrote {} demo notes to {}", notes.len(), directory.display());
    Dataset::new(directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::char_slice;

    #[test]
    fn test_every_entity_is_found() {
        for note in clinical_notes() {
            let annotations = note.annotations().unwrap();
            assert_eq!(annotations.len(), note.entities.len(), "{}", note.id);
            for entity in &annotations.entities {
                assert_eq!(char_slice(note.text, entity.start, entity.end), Some(entity.text.as_str()));
            }
        }
    }

    #[test]
    fn test_offsets_follow_text_order() {
        let note = &clinical_notes()[0];
        let annotations = note.annotations().unwrap();
        // "PO" aparece duas vezes; a segunda anotação aponta para a segunda ocorrência
        let routes: Vec<usize> = annotations
            .entities
            .iter()
            .filter(|e| e.label == "Route")
            .map(|e| e.start)
            .collect();
        assert_eq!(routes.len(), 2);
        assert!(routes[0] < routes[1]);
    }

    #[test]
    fn test_write_demo_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_demo_dataset(dir.path()).unwrap();
        assert_eq!(dataset.len(), clinical_notes().len());
        assert!(dataset.is_annotated());
        assert!(dataset.is_metamapped());

        let parsed = Annotations::from_file(dir.path().join("note-02.ann").as_path()).unwrap();
        assert_eq!(parsed.entities[0].label, "Drug");
        assert_eq!(parsed.entities[0].text, "furosemide");
    }
}
