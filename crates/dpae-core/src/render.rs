//! # Document Renderer
//!
//! Fills the two documents exchanged with the declaration service:
//!
//! - the **authentication** request (`<identifiants>`), which carries the
//!   password and is therefore returned as a zeroizing string;
//! - the **declaration** (`FR_DUE_Upload`), whose element names, order and
//!   whitespace follow the remote schema byte for byte.
//!
//! Rendering is a pure function of (template, data). All validation and
//! normalization happens beforehand in [`prepare_declaration`], so a
//! [`PreparedDeclaration`] always renders into a document whose environment
//! indicator, service code and nature code are in their enumerated domains.

use std::borrow::Cow;

use zeroize::Zeroizing;

use crate::error::ValidationError;
use crate::format::{
    normalize_birth_department, normalize_date, normalize_health_service, normalize_text,
    normalize_time, TextClass,
};
use crate::model::{Credentials, DeclarationContext, Environment, NatureCode, ServiceCode};

const AUTHENTICATION_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<identifiants>
    <siret>{{siret}}</siret>
    <nom>{{nom}}</nom>
    <prenom>{{prenom}}</prenom>
    <motdepasse>{{motdepasse}}</motdepasse>
    <service>{{service}}</service>
</identifiants>"#;

const DECLARATION_TEMPLATE: &str = r#"<?xml version="1.0" encoding="ISO-8859-1" ?>
<FR_DUE_Upload xmlns:cct="urn:oasis:names:tc:ubl:corecomponentTypes:1.0:0.70"
    xmlns:rxdt="http://www.repxml.org/DataTypes"
    xmlns:rxorg="http://www.repxml.org/Organization"
    xmlns:rxpadr="http://www.repxml.org/PostalAddress"
    xmlns:rxpers="http://www.repxml.org/Person_Identity"
    xmlns:rxphadr="http://www.repxml.org/PhoneAddress"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" >
    <FR_DUE_Upload.Test.Indicator> {{environment_indicator}} </FR_DUE_Upload.Test.Indicator>
    <FR_DuesGroup>
        <FR_Employer>
            <FR_EmployerIdentity>
                <rxorg:FR_Organization.SIRET.Identifier> {{employer.siret}} </rxorg:FR_Organization.SIRET.Identifier>
                <rxorg:FR_Organization.Designation.Text> {{employer.designation}} </rxorg:FR_Organization.Designation.Text>
                <rxorg:FR_Organization.APE.Code> {{employer.ape_code}} </rxorg:FR_Organization.APE.Code>
            </FR_EmployerIdentity>
            <FR_Employer.URSSAF.Code> {{employer.urssaf_code}} </FR_Employer.URSSAF.Code>
            <FR_EmployerAddress>
                <rxpadr:FR_PostalAddress.StreetDesignation.Text> {{employer.address}} </rxpadr:FR_PostalAddress.StreetDesignation.Text>
                <rxpadr:FR_PostalAddress.Town.Text> {{employer.town}} </rxpadr:FR_PostalAddress.Town.Text>
                <rxpadr:FR_PostalAddress.Postal.Code> {{employer.postal_code}} </rxpadr:FR_PostalAddress.Postal.Code>
            </FR_EmployerAddress>
            <FR_EmployerContact>
                <FR_PhoneNumber>
                    <rxphadr:FR_PhoneAddress.PhoneNumber.Text> {{employer.phone}} </rxphadr:FR_PhoneAddress.PhoneNumber.Text>
                </FR_PhoneNumber>
            </FR_EmployerContact>
        </FR_Employer>
        <FR_EmployeeGroup>
            <FR_Employee>
                <FR_EmployeeIdentity>
                    <rxpers:FR_PersonIdentity.Surname.Text> {{employee.surname}} </rxpers:FR_PersonIdentity.Surname.Text>
                    <rxpers:FR_PersonIdentity.ChristianName.Text> {{employee.christian_name}} </rxpers:FR_PersonIdentity.ChristianName.Text>
                    <rxpers:FR_PersonIdentity.Sex.Code> {{employee.sex}} </rxpers:FR_PersonIdentity.Sex.Code>
                    <rxpers:FR_NNI>
                        <rxpers:FR_NNI.NIR.Identifier> {{employee.nir}} </rxpers:FR_NNI.NIR.Identifier>
                        <rxpers:FR_NNI.NIRKey.Text> {{employee.nir_key}} </rxpers:FR_NNI.NIRKey.Text>
                    </rxpers:FR_NNI>
                    <rxpers:FR_Birth>
                        <rxpers:FR_Birth.Date> {{employee.birth_date}} </rxpers:FR_Birth.Date>
                        <rxpers:FR_Birth.Town.Text> {{employee.birth_town}} </rxpers:FR_Birth.Town.Text>
                    </rxpers:FR_Birth>
                </FR_EmployeeIdentity>
                <FR_EmployeeComplement>
                    <FR_EmployeeComplement.Birth_Department.Code> {{employee.birth_department}} </FR_EmployeeComplement.Birth_Department.Code>
                </FR_EmployeeComplement>
            </FR_Employee>
            <FR_Contract>
                <FR_Contract.StartContract.Date>{{contract.start_date}}</FR_Contract.StartContract.Date>
                <FR_Contract.StartContract.Time>{{contract.start_time}}</FR_Contract.StartContract.Time>
                <FR_Contract.EndContract.Date>{{contract.end_date}}</FR_Contract.EndContract.Date>
                <FR_Contract.Nature.Code>{{contract.nature_code}}</FR_Contract.Nature.Code>
                <FR_Contract.HealthService.Text>{{employer.health_service}}</FR_Contract.HealthService.Text>
            </FR_Contract>
        </FR_EmployeeGroup>
    </FR_DuesGroup>
</FR_DUE_Upload>"#;

// ── Templates ────────────────────────────────────────────────────────

/// The documents this client knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentTemplate {
    Authentication,
    Declaration,
}

impl DocumentTemplate {
    /// The raw template text.
    pub fn source(self) -> &'static str {
        match self {
            Self::Authentication => AUTHENTICATION_TEMPLATE,
            Self::Declaration => DECLARATION_TEMPLATE,
        }
    }
}

/// Named values available to a template.
pub trait TemplateData {
    /// Value of the `{{name}}` placeholder, unescaped.
    fn field(&self, name: &str) -> Option<&str>;
}

/// Fill `template` with `data`, XML-escaping every substituted value.
///
/// Fails if the template references a name `data` does not provide.
pub fn render(template: DocumentTemplate, data: &dyn TemplateData) -> Result<String, ValidationError> {
    let source = template.source();
    let mut out = String::with_capacity(source.len() + 512);
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| ValidationError::UnknownTemplateField(after.to_string()))?;
        let name = after[..end].trim();
        let value = data
            .field(name)
            .ok_or_else(|| ValidationError::UnknownTemplateField(name.to_string()))?;
        out.push_str(&xml_escape(value));
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Escape the five XML special characters.
pub fn xml_escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 16);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

// ── Authentication document ──────────────────────────────────────────

struct AuthenticationData<'a> {
    credentials: &'a Credentials,
    service: ServiceCode,
    password: &'a str,
}

impl TemplateData for AuthenticationData<'_> {
    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "siret" => Some(&self.credentials.organization_id),
            "nom" => Some(&self.credentials.last_name),
            "prenom" => Some(&self.credentials.first_name),
            "motdepasse" => Some(self.password),
            "service" => Some(self.service.as_str()),
            _ => None,
        }
    }
}

/// Render the authentication request.
///
/// The result embeds the password and is wiped from memory when dropped.
pub fn render_authentication(
    credentials: &Credentials,
    password: &str,
) -> Result<Zeroizing<String>, ValidationError> {
    if credentials.organization_id.is_empty() {
        return Err(ValidationError::MissingField("credentials.organization_id"));
    }
    if password.is_empty() {
        return Err(ValidationError::MissingField("password"));
    }
    let data = AuthenticationData {
        credentials,
        service: ServiceCode::parse(&credentials.service_code)?,
        password,
    };
    render(DocumentTemplate::Authentication, &data).map(Zeroizing::new)
}

// ── Declaration document ─────────────────────────────────────────────

/// A field whose value was altered by free-text normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLoss {
    /// Template name of the field, e.g. `employee.surname`.
    pub field: &'static str,
    /// Characters dropped by the allow-set.
    pub stripped: usize,
    /// Characters dropped by the length cap.
    pub truncated: usize,
}

/// Per-field account of characters lost during normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    losses: Vec<FieldLoss>,
}

impl NormalizationReport {
    /// True when no field lost characters.
    pub fn is_clean(&self) -> bool {
        self.losses.is_empty()
    }

    /// Fields that lost characters, in document order.
    pub fn losses(&self) -> &[FieldLoss] {
        &self.losses
    }

    /// Total characters stripped across all fields.
    pub fn total_stripped(&self) -> usize {
        self.losses.iter().map(|l| l.stripped).sum()
    }
}

/// Declaration fields after validation and normalization, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDeclaration {
    pub environment: Environment,
    pub service_code: ServiceCode,
    pub nature_code: NatureCode,
    environment_indicator: String,
    employer_siret: String,
    employer_designation: String,
    employer_ape_code: String,
    employer_urssaf_code: String,
    employer_address: String,
    employer_town: String,
    employer_postal_code: String,
    employer_phone: String,
    employer_health_service: String,
    employee_surname: String,
    employee_christian_name: String,
    employee_sex: String,
    employee_nir: String,
    employee_nir_key: String,
    employee_birth_date: String,
    employee_birth_town: String,
    employee_birth_department: String,
    contract_start_date: String,
    contract_start_time: String,
    contract_end_date: String,
}

impl TemplateData for PreparedDeclaration {
    fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "environment_indicator" => &self.environment_indicator,
            "employer.siret" => &self.employer_siret,
            "employer.designation" => &self.employer_designation,
            "employer.ape_code" => &self.employer_ape_code,
            "employer.urssaf_code" => &self.employer_urssaf_code,
            "employer.address" => &self.employer_address,
            "employer.town" => &self.employer_town,
            "employer.postal_code" => &self.employer_postal_code,
            "employer.phone" => &self.employer_phone,
            "employer.health_service" => &self.employer_health_service,
            "employee.surname" => &self.employee_surname,
            "employee.christian_name" => &self.employee_christian_name,
            "employee.sex" => &self.employee_sex,
            "employee.nir" => &self.employee_nir,
            "employee.nir_key" => &self.employee_nir_key,
            "employee.birth_date" => &self.employee_birth_date,
            "employee.birth_town" => &self.employee_birth_town,
            "employee.birth_department" => &self.employee_birth_department,
            "contract.start_date" => &self.contract_start_date,
            "contract.start_time" => &self.contract_start_time,
            "contract.end_date" => &self.contract_end_date,
            "contract.nature_code" => return Some(self.nature_code.as_str()),
            _ => return None,
        };
        Some(value)
    }
}

/// Validate and normalize every declaration field.
///
/// Fails on an out-of-domain environment, service code or nature code, or
/// on an unparseable date or time. Free-text fields never fail; what they
/// lose is listed in the returned report and logged.
pub fn prepare_declaration(
    ctx: &DeclarationContext,
) -> Result<(PreparedDeclaration, NormalizationReport), ValidationError> {
    let environment = ctx.environment()?;
    let service_code = ServiceCode::parse(&ctx.credentials.service_code)?;
    let nature_code = NatureCode::parse(&ctx.contract.nature_code)?;

    let employer = &ctx.employer;
    let employee = &ctx.employee;
    let contract = &ctx.contract;

    let mut report = NormalizationReport::default();
    let mut text = |field: &'static str, raw: &str, class: TextClass| -> String {
        let normalized = normalize_text(raw, class);
        if normalized.is_lossy() {
            tracing::warn!(
                field,
                stripped = normalized.stripped,
                truncated = normalized.truncated,
                "free-text field lost characters during normalization"
            );
            report.losses.push(FieldLoss {
                field,
                stripped: normalized.stripped,
                truncated: normalized.truncated,
            });
        }
        normalized.value
    };

    let employer_designation = text("employer.designation", &employer.designation, TextClass::EmployerText);
    let employer_address = text("employer.address", &employer.address, TextClass::EmployerText);
    let employer_town = text("employer.town", &employer.town, TextClass::EmployerText);
    let employer_postal_code = text("employer.postal_code", &employer.postal_code, TextClass::EmployerText);
    let employee_surname = text("employee.surname", &employee.surname, TextClass::PersonName);
    let employee_christian_name = text("employee.christian_name", &employee.christian_name, TextClass::PersonName);
    let employee_birth_town = text("employee.birth_town", &employee.birth_town, TextClass::Town);

    let contract_end_date = match contract.end_date.as_deref().map(str::trim) {
        None | Some("") => String::new(),
        Some(raw) => normalize_date(raw)?,
    };

    let prepared = PreparedDeclaration {
        environment,
        service_code,
        nature_code,
        environment_indicator: environment.indicator().to_string(),
        employer_siret: employer.siret.clone(),
        employer_designation,
        employer_ape_code: employer.ape_code.clone(),
        employer_urssaf_code: employer.urssaf_code.clone(),
        employer_address,
        employer_town,
        employer_postal_code,
        employer_phone: employer.phone.clone(),
        employer_health_service: normalize_health_service(employer.health_service.as_deref()),
        employee_surname,
        employee_christian_name,
        employee_sex: employee.sex.to_string(),
        employee_nir: employee.nir.clone(),
        employee_nir_key: employee.nir_key.clone(),
        employee_birth_date: normalize_date(&employee.birth_date)?,
        employee_birth_town,
        employee_birth_department: normalize_birth_department(employee.birth_department.as_deref()),
        contract_start_date: normalize_date(&contract.start_date)?,
        contract_start_time: normalize_time(&contract.start_time)?,
        contract_end_date,
    };
    Ok((prepared, report))
}

/// Render a prepared declaration.
pub fn render_declaration(prepared: &PreparedDeclaration) -> Result<String, ValidationError> {
    render(DocumentTemplate::Declaration, prepared)
}

/// Encode a rendered document as ISO-8859-1 bytes.
///
/// Every character above U+00FF is refused; the service only accepts
/// Latin-1 on the wire.
pub fn encode_latin1(document: &str) -> Result<Vec<u8>, ValidationError> {
    document
        .char_indices()
        .map(|(offset, character)| {
            u8::try_from(u32::from(character))
                .map_err(|_| ValidationError::NotLatin1 { character, offset })
        })
        .collect()
}
