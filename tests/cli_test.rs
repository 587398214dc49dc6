use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;

const HEADER: &str = "order_id,product_id,product_name,price,payment_method,status,first_name,last_name,email,phone,card_last4,processed_at";

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let config = common::instant_config()?;

    let mut cmd = Command::new(cargo_bin!("checkout-flow"));
    cmd.arg("tests/fixtures/scenario.json")
        .arg("--config")
        .arg(config.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(HEADER))
        .stdout(predicate::str::contains(
            "P1,Professional Business Website Template,299,credit-card,completed,Jane,Doe,jane@example.com,,1111,",
        ))
        .stdout(predicate::str::contains(
            "P3,React Native App Template,499,bank-transfer,pending,Sam,Lee,sam@example.com,,,",
        ))
        .stderr(predicate::str::contains("Confirmation email sent to jane@example.com"));

    Ok(())
}

#[test]
fn test_cli_masks_typed_card_fields() -> Result<(), Box<dyn std::error::Error>> {
    let config = common::instant_config()?;
    let scenario = common::write_file(
        r#"[
            {"action": "purchase", "product": {"id": "P4", "name": "Admin Dashboard Template", "price": 399}},
            {"action": "input", "field": "cardNumber", "value": "5500005555555559"},
            {"action": "input", "field": "expiryDate", "value": "1299"},
            {"action": "input", "field": "cvv", "value": "12a34"},
            {"action": "submit", "paymentMethod": "credit-card", "fields": {
                "firstName": "Jane", "lastName": "Doe", "email": "jane@example.com", "cardName": "Jane Doe"
            }}
        ]"#,
    )?;

    let mut cmd = Command::new(cargo_bin!("checkout-flow"));
    cmd.arg(scenario.path()).arg("--config").arg(config.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("P4,Admin Dashboard Template,399,credit-card,completed"))
        .stdout(predicate::str::contains(",5559,"));

    Ok(())
}

#[test]
fn test_cli_blur_reports_field_error() -> Result<(), Box<dyn std::error::Error>> {
    let config = common::instant_config()?;
    let scenario = common::write_file(
        r#"[
            {"action": "purchase", "product": {"id": "P1", "name": "Template", "price": 299}},
            {"action": "input", "field": "cvv", "value": "1x2"},
            {"action": "blur", "field": "cvv"}
        ]"#,
    )?;

    let mut cmd = Command::new(cargo_bin!("checkout-flow"));
    cmd.arg(scenario.path()).arg("--config").arg(config.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains(
            "[field] cvv: Please enter a valid CVV (3-4 digits)",
        ));

    Ok(())
}

#[test]
fn test_cli_invalid_form_writes_no_records() -> Result<(), Box<dyn std::error::Error>> {
    let config = common::instant_config()?;
    let scenario = common::write_file(
        r#"[
            {"action": "purchase", "product": {"id": "P1", "name": "Template", "price": 299}},
            {"action": "submit", "paymentMethod": "credit-card", "fields": {
                "firstName": "Jane", "lastName": "Doe", "email": "jane@example.com",
                "cardNumber": "4111 1111 1111 1111", "expiryDate": "12/99", "cvv": "12", "cardName": "Jane Doe"
            }}
        ]"#,
    )?;

    let mut cmd = Command::new(cargo_bin!("checkout-flow"));
    cmd.arg(scenario.path()).arg("--config").arg(config.path());

    let output = cmd.output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim_end(), HEADER);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Please correct the errors in the form."));

    Ok(())
}

#[test]
fn test_cli_missing_scenario_fails() {
    let mut cmd = Command::new(cargo_bin!("checkout-flow"));
    cmd.arg("tests/fixtures/does-not-exist.json");

    cmd.assert().failure();
}
