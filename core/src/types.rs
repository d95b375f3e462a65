//! Wire DTOs for the CRM API.
//!
//! # Design
//! These types are defined independently of the mock-server crate; the
//! integration tests catch drift between the two. Person payloads use
//! camelCase keys while form payloads use PascalCase, matching what the
//! server emits. Fields the server fills loosely are `serde_json::Value`
//! and every response field defaults, so partial payloads still decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{EnforcedString, StringOrArray};

/// Platform code sent with every login.
pub const PLATFORM_TYPE: i32 = 1;

/// Login payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
    pub device_id: String,
    pub platform_type: i32,
}

/// Bearer token issued by the login endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Token {
    /// A missing or zero expiry means the token does not expire.
    pub fn is_offline(&self) -> bool {
        self.expires_at.unwrap_or(0) == 0
    }
}

/// Body of the `get` endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRequest {
    pub id: String,
    pub show_previews: bool,
    pub show_extended_previews: bool,
    pub include_process_life_paths: bool,
    pub include_color: bool,
    pub include_tags: bool,
    pub include_list_fields: bool,
}

/// A user-defined field on a CRM object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedProperty {
    #[serde(alias = "UserKey")]
    pub user_key: String,
    #[serde(alias = "Value", default)]
    pub value: EnforcedString,
    #[serde(alias = "Preview", default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<Value>,
}

impl ExtendedProperty {
    pub fn new(user_key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            user_key: user_key.into(),
            value: EnforcedString(value.into()),
            preview: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneContact {
    #[serde(default)]
    pub phone_type: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub continued_number: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// A person record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonInfo {
    #[serde(rename = "crmId")]
    pub crm_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<Value>,
    pub gender: String,
    pub person_prefix: String,
    pub national_code: String,
    pub preferred_contact_type: String,
    pub nick_name: String,
    pub email: String,
    pub alternative_email: String,
    pub website: String,
    pub customer_number: String,
    pub classification: String,
    pub balance: i64,
    pub identity_type_name: String,
    pub phone_contacts: Vec<PhoneContact>,
    pub categories: Vec<Category>,
    pub support_username: String,
    pub sale_username: String,
    #[serde(rename = "crmObjectTypeCode")]
    pub crm_object_type_code: String,
    #[serde(rename = "crmObjectTypeId")]
    pub crm_object_type_id: String,
    #[serde(rename = "crmObjectTypeIndex")]
    pub crm_object_type_index: i64,
    #[serde(rename = "parentCrmObjectId")]
    pub parent_crm_object_id: Option<String>,
    pub extended_properties: Vec<ExtendedProperty>,
    pub ref_id: String,
    pub stage_id: Option<String>,
    pub identity_id: String,
    pub description: String,
    pub subject: String,
    pub creat_date: Option<String>,
    pub modify_date: Option<String>,
}

/// `{"Name": ...}` preview attached to form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    #[serde(rename = "Name", default)]
    pub name: String,
}

/// A form record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FormInfo {
    #[serde(rename = "CrmId")]
    pub crm_id: String,
    #[serde(rename = "CrmObjectTypeIndex")]
    pub crm_object_type_index: i64,
    #[serde(rename = "CrmObjectTypeIndexPreview")]
    pub crm_object_type_index_preview: Option<Preview>,
    #[serde(rename = "CrmObjectTypeName")]
    pub crm_object_type_name: Option<Preview>,
    #[serde(rename = "CrmObjectTypeId")]
    pub crm_object_type_id: String,
    #[serde(rename = "CrmObjectTypeCode")]
    pub crm_object_type_code: String,
    #[serde(rename = "ParentCrmObjectId")]
    pub parent_crm_object_id: Option<String>,
    pub extended_properties: Vec<ExtendedProperty>,
    pub tags: Option<StringOrArray>,
    pub ref_id: String,
    pub stage_id: Option<String>,
    pub identity_id: String,
    pub identity_id_preview: Option<Preview>,
    pub description: String,
    pub subject: String,
    pub color: Option<Value>,
    pub modifier_id: String,
    pub modifier_id_preview: Option<Preview>,
    pub creator_id: String,
    pub creator_id_preview: Option<Preview>,
    pub assigned_to_id: Option<String>,
    pub assigned_to_id_preview: Option<Preview>,
}

impl FormInfo {
    /// Value of the extended property keyed `user_key`.
    pub fn property(&self, user_key: &str) -> Option<&str> {
        self.extended_properties
            .iter()
            .find(|p| p.user_key == user_key)
            .map(|p| p.value.as_str())
    }
}

/// Payload for creating a form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormRequest {
    #[serde(rename = "crmObjectTypeCode")]
    pub crm_object_type_code: String,
    #[serde(rename = "parentCrmObjectId")]
    pub parent_crm_object_id: Option<String>,
    pub extended_properties: Vec<ExtendedProperty>,
    pub identity_id: String,
    pub tags: Option<Vec<String>>,
    pub ref_id: Option<String>,
    pub color_id: i64,
    pub assigned_to_user_name: Option<String>,
    pub stage_id: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
}

/// Payload for updating a form. `crm_id` selects the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFormRequest {
    #[serde(rename = "crmId")]
    pub crm_id: String,
    #[serde(rename = "parentCrmObjectId")]
    pub parent_crm_object_id: Option<String>,
    pub extended_properties: Option<Vec<ExtendedProperty>>,
    pub tags: Vec<String>,
    pub stage_id: Option<String>,
    pub color_id: i64,
    pub identity_id: String,
}

/// One line of a purchase invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detail {
    pub is_service: bool,
    pub base_unit_price: i64,
    pub final_unit_price: i64,
    pub count: i64,
    pub returned_count: i64,
    pub total_unit_price: i64,
    pub total_discount: i64,
    pub total_vat: i64,
    pub total_toll: i64,
    pub product_code: String,
    pub product_id: String,
    pub product_name: String,
    pub discount_percent: String,
    pub detail_description: String,
    pub product_unit_type_name: String,
}

/// Payload for creating a purchase invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePurchase {
    #[serde(rename = "crmId", default, skip_serializing_if = "String::is_empty")]
    pub crm_id: String,
    #[serde(rename = "crmObjectTypeCode")]
    pub crm_object_type_code: String,
    pub details: Vec<Detail>,
    pub discount: i64,
    pub final_value: i64,
    pub toll: i64,
    pub total_value: i64,
    pub vat: i64,
    #[serde(rename = "parentCrmObjectId")]
    pub parent_crm_object_id: Option<String>,
    pub extended_properties: Vec<ExtendedProperty>,
    pub tags: Option<Vec<String>>,
    pub ref_id: Option<String>,
    pub stage_id: Option<String>,
    pub color_id: i64,
    pub identity_id: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub assigned_to_user_name: Option<String>,
    pub number: Option<String>,
    pub price_list_name: Option<String>,
    pub additional_costs: Option<String>,
    pub invoice_date: Option<String>,
    pub expire_date: Option<String>,
    pub discount_percent: Option<String>,
    pub related_quote_id: Option<String>,
}

/// Option code the delete endpoint expects.
pub const DELETE_OPTION: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub id: String,
    pub option: i32,
}

/// `{"crmId": ...}` returned by create/update endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmIdResponse {
    #[serde(rename = "crmId", default)]
    pub crm_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindResponse {
    pub data: Vec<PersonInfo>,
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindFormResponse {
    pub data: Vec<FormInfo>,
    pub total: i64,
}
