use cert_common::{
    codegen::share_link,
    models::{Certificate, CertificateStatus, Mention, Subject},
};
use colored::Colorize;

pub fn status_label(status: &CertificateStatus) -> String {
    match status {
        CertificateStatus::Valid => status.to_string().green().to_string(),
        CertificateStatus::Annulled => status.to_string().red().to_string(),
        CertificateStatus::Other(_) => status.to_string().yellow().to_string(),
    }
}

pub fn print_certificate(certificate: &Certificate, public_url: &str) {
    println!("Code:        {}", certificate.code.bold());
    println!("Holder:      {}", certificate.full_name());
    if let Some(subject_key) = &certificate.subject_key {
        println!("DNI:         {subject_key}");
    }
    println!("Course:      {}", certificate.course);
    if let Some(hours) = &certificate.hours {
        println!("Hours:       {hours}");
    }
    println!("Issued:      {}", certificate.issue_date);
    println!("Status:      {}", status_label(&certificate.status));
    match &certificate.verify_url {
        Some(url) => println!("Verify at:   {url}"),
        None if !certificate.code.is_empty() => {
            println!("Verify at:   {}", share_link(public_url, &certificate.code))
        }
        None => {}
    }
}

/// One line per certificate, for listings.
pub fn certificate_row(certificate: &Certificate) -> String {
    format!(
        "{:<14} {:<10} {:<12} {} - {}",
        certificate.code,
        status_label(&certificate.status),
        certificate.issue_date,
        certificate.full_name(),
        certificate.course
    )
}

pub fn print_mention(mention: &Mention) {
    println!("Mention:     {}", mention.nro.bold());
    println!("Specialty:   {}", mention.specialty);
    println!("Course:      {}", mention.certificate_title);
    println!("Mention:     {}", mention.mention);
    println!("Hours:       {}", mention.hours);
    println!("Runs:        {} to {}", mention.start_date, mention.end_date);
    println!("Issued:      {}", mention.issue_date);
}

pub fn mention_row(mention: &Mention) -> String {
    format!(
        "{:<8} {} ({} h)",
        mention.nro, mention.certificate_title, mention.hours
    )
}

pub fn print_subject(subject: &Subject) {
    println!("DNI:         {}", subject.subject_key);
    println!("Name:        {}", subject.full_name);
    if let Some(phone) = &subject.phone {
        println!("Phone:       {phone}");
    }
    if let Some(email) = &subject.email {
        println!("Email:       {email}");
    }
}
