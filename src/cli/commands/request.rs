//! Request command - run one request through the image routes

use crate::cli::args::RequestArgs;
use crate::config::Config;
use crate::error::DerivoResult;
use crate::http::{HttpResponse, ResponseBody};
use console::style;
use ureq::http::StatusCode;

pub async fn execute(args: RequestArgs, config: &Config) -> DerivoResult<()> {
    let service = super::service(config).await?;
    let response = service.handle(&args.method, &args.path).await;
    print_response(&response);
    Ok(())
}

fn print_response(response: &HttpResponse) {
    let reason = StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("");
    let status = format!("{} {}", response.status, reason);
    let status = if response.status < 400 {
        style(status).green()
    } else {
        style(status).red()
    };
    println!("HTTP {}", status);
    println!("content-type: {}", response.content_type());

    match &response.body {
        ResponseBody::File(path) => println!("{}", path.display()),
        ResponseBody::Text(text) => println!("{}", text),
        ResponseBody::Empty => {}
    }
}
