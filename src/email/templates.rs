/// Minimal escaping for values interpolated into the HTML bodies below.
fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn greeting(name: &str) -> String {
    if name.trim().is_empty() {
        "Hello,".to_string()
    } else {
        format!("Hello {},", escape(name))
    }
}

pub fn render_activation_code(name: &str, code: i32) -> String {
    let greeting = greeting(name);
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Welcome to Flapi</h2>
    <p>{greeting}</p>
    <p>Your account has been created. Enter this code to activate it:</p>
    <p style="font-size: 28px; letter-spacing: 6px; font-weight: bold;">{code:06}</p>
    <p style="color: #666; font-size: 14px;">If you didn't sign up for Flapi, you can ignore this email.</p>
</body>
</html>"#
    )
}

pub fn render_new_code(name: &str, code: i32) -> String {
    let greeting = greeting(name);
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Your new activation code</h2>
    <p>{greeting}</p>
    <p>A new activation code was requested for your Flapi account:</p>
    <p style="font-size: 28px; letter-spacing: 6px; font-weight: bold;">{code:06}</p>
    <p style="color: #666; font-size: 14px;">Previous codes no longer work.</p>
</body>
</html>"#
    )
}

pub fn render_application_ready(application_name: &str, urls: &[String]) -> String {
    let application_name = escape(application_name);
    let links: String = urls
        .iter()
        .map(|url| {
            let url = escape(url);
            format!(r#"        <li><a href="https://{url}">{url}</a></li>"#)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>{application_name} is ready</h2>
    <p>Your repository, databases and domains have been provisioned. The first deployment is running.</p>
    <ul>
{links}
    </ul>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_zero_padded() {
        let html = render_activation_code("Ada", 4217);
        assert!(html.contains(">004217<"));
        assert!(html.contains("Hello Ada,"));
    }

    #[test]
    fn names_are_escaped() {
        let html = render_new_code("<script>", 123456);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn ready_mail_lists_every_url() {
        let urls = vec![
            "dev.shop.flapi.org".to_string(),
            "shop.flapi.org".to_string(),
        ];
        let html = render_application_ready("Shop", &urls);
        assert!(html.contains(r#"href="https://dev.shop.flapi.org""#));
        assert!(html.contains(r#"href="https://shop.flapi.org""#));
    }
}
