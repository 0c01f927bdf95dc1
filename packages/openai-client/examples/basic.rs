//! Basic OpenAI client usage example

use openai_client::{ChatRequest, Message, OpenAIClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize from environment
    let client = OpenAIClient::from_env()?;

    // Text ad analysis in JSON mode
    println!("=== Text Analysis ===");
    let response = client
        .chat_completion(
            ChatRequest::new("gpt-4o-mini")
                .message(Message::system(
                    "You analyze ad creatives. Reply with JSON: summary, key_insights, strategic_notes.",
                ))
                .message(Message::user("Ad text:\nTents 30% off this weekend only!\nCTA: Shop Now"))
                .temperature(0.3)
                .max_tokens(400)
                .json_mode(),
        )
        .await?;

    println!("Response: {}", response.content);
    if let Some(usage) = &response.usage {
        println!("Tokens used: {}", usage.total_tokens);
    }

    // Image creative analysis
    println!("\n=== Image Analysis ===");
    let images = vec!["https://upload.wikimedia.org/wikipedia/commons/3/3f/Tent.jpg".to_string()];
    let response = client
        .chat_completion(
            ChatRequest::new("gpt-4o-mini")
                .message(Message::user_with_images(
                    "Describe the visual hook of this ad image in one sentence.",
                    &images,
                ))
                .max_tokens(100),
        )
        .await?;

    println!("Response: {}", response.content);

    Ok(())
}
