//! Wire shapes for the question-list endpoint.
//!
//! Field names mirror the backend's camelCase JSON; every nesting level is
//! optional or defaulted so structural validation stays with the caller.

use serde::{Deserialize, Serialize};

/// Visit-type selector sent in the question-list request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitTypeRef {
    pub visit_type_id: i64,
}

/// Top-level response envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionListResponse {
    #[serde(default)]
    pub content: Option<QuestionListContent>,
}

/// `content` level of the envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionListContent {
    #[serde(default)]
    pub data: Vec<QuestionListData>,
}

/// One data entry; carries the questionnaire templates for a visit type
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionListData {
    #[serde(default)]
    pub questionnaire_template_list: Vec<QuestionnaireTemplate>,
}

/// One questionnaire template holding the ordered question list
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireTemplate {
    #[serde(default)]
    pub question_lists: Vec<RawQuestion>,
}

/// A question as the backend ships it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    #[serde(rename = "questionnaireMasterID")]
    pub questionnaire_master_id: i64,
    pub question: String,
    #[serde(default)]
    pub question_es: Option<String>,
    #[serde(default)]
    pub question_type_code: Option<String>,
    #[serde(default)]
    pub condition_value1: Option<String>,
    #[serde(default)]
    pub condition_value2: Option<String>,
    #[serde(default)]
    pub condition_value3: Option<String>,
    #[serde(default)]
    pub answers: Vec<RawAnswerOption>,
}

/// A selectable answer option as the backend ships it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnswerOption {
    #[serde(rename = "questionnaireOptionsID")]
    pub questionnaire_options_id: i64,
    pub option_value: String,
    #[serde(default)]
    pub option_value_es: Option<String>,
    #[serde(default)]
    pub option_info: Option<String>,
    #[serde(default)]
    pub option_info_es: Option<String>,
    #[serde(default)]
    pub numeric_value: Option<f64>,
    #[serde(default)]
    pub display_order: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_list_deserializes_from_wire_names() {
        let json = serde_json::json!({
            "content": {
                "data": [{
                    "questionnaireTemplateList": [{
                        "questionLists": [{
                            "questionnaireMasterID": 7,
                            "question": "Do you smoke?",
                            "questionEs": "¿Fuma usted?",
                            "questionTypeCode": "YESORNO",
                            "answers": [{
                                "questionnaireOptionsID": 1,
                                "optionValue": "Yes",
                                "numericValue": 1.0,
                                "displayOrder": 1
                            }]
                        }]
                    }]
                }]
            }
        });

        let parsed: QuestionListResponse = serde_json::from_value(json).unwrap();
        let content = parsed.content.unwrap();
        let question = &content.data[0].questionnaire_template_list[0].question_lists[0];
        assert_eq!(question.questionnaire_master_id, 7);
        assert_eq!(question.question, "Do you smoke?");
        assert_eq!(question.question_type_code.as_deref(), Some("YESORNO"));
        assert_eq!(question.answers[0].option_value, "Yes");
        assert_eq!(question.answers[0].display_order, Some(1));
    }

    #[test]
    fn test_missing_levels_default_cleanly() {
        let parsed: QuestionListResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(parsed.content.is_none());

        let parsed: QuestionListResponse =
            serde_json::from_value(serde_json::json!({"content": {}})).unwrap();
        assert!(parsed.content.unwrap().data.is_empty());
    }
}
